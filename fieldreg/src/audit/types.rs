//! 監査台帳の型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// システム起点の操作で`actor_id`の代わりにハッシュへ入れる値
pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// 監査エントリ（書き込み後は不変）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    /// 作成順の連番
    pub seq: i64,
    /// エントリID
    pub id: String,
    /// アクターID（Noneはシステム起点）
    pub actor_id: Option<String>,
    /// 操作名
    pub action: String,
    /// 対象リソース種別
    pub target_resource: String,
    /// 対象ID（一括操作ではNone、対象集合はdetailsに記録）
    pub target_id: Option<String>,
    /// 操作の追加情報
    pub details: Value,
    /// クライアントIP
    pub ip_address: Option<String>,
    /// User-Agent
    pub user_agent: Option<String>,
    /// 作成時刻（ミリ秒精度）
    pub created_at: DateTime<Utc>,
    /// SHA-256ハッシュ（hex）
    pub hash: String,
    /// 直前エントリのハッシュ（先頭はジェネシスハッシュ）
    pub previous_hash: String,
}

/// 追記前の監査エントリ
///
/// ID・作成時刻・ハッシュは追記時に台帳が決定する。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewAuditEntry {
    /// アクターID
    pub actor_id: Option<String>,
    /// 操作名
    pub action: String,
    /// 対象リソース種別
    pub target_resource: String,
    /// 対象ID
    pub target_id: Option<String>,
    /// 追加情報
    pub details: Option<Value>,
    /// クライアントIP
    pub ip_address: Option<String>,
    /// User-Agent
    pub user_agent: Option<String>,
}

impl NewAuditEntry {
    /// 操作名と対象リソースから生成
    pub fn new(action: impl Into<String>, target_resource: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            target_resource: target_resource.into(),
            ..Default::default()
        }
    }

    /// アクターを設定
    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// 追加情報を設定
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// 接続元情報を設定
    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// 監査エントリ検索フィルタ
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditEntryFilter {
    /// アクターIDでフィルタ
    pub actor_id: Option<String>,
    /// 操作名でフィルタ
    pub action: Option<String>,
    /// 対象リソース種別でフィルタ
    pub target_resource: Option<String>,
    /// 開始日時
    pub time_from: Option<DateTime<Utc>>,
    /// 終了日時
    pub time_to: Option<DateTime<Utc>>,
    /// ページ番号（1始まり）
    pub page: Option<i64>,
    /// ページあたり件数
    pub per_page: Option<i64>,
}

/// 改ざん検出の種別
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TamperKind {
    /// 内容から再計算したハッシュが保存値と一致しない
    HashMismatch,
    /// previous_hashが直前エントリのハッシュと一致しない
    BrokenLink,
}

/// 改ざんが検出されたエントリへの参照
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TamperedEntry {
    /// エントリID
    pub id: String,
    /// 連番
    pub seq: i64,
    /// 作成時刻
    pub created_at: DateTime<Utc>,
    /// 検出種別
    pub kind: TamperKind,
}

/// チェーン検証結果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainVerificationResult {
    /// 検証が成功したか
    pub valid: bool,
    /// 台帳の総エントリ数（limit指定時も全件数）
    pub total_records: i64,
    /// 検証を通過したエントリ数
    pub verified: i64,
    /// 最初に改ざんが検出されたエントリ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_tampered: Option<TamperedEntry>,
    /// メッセージ（該当する場合）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
