//! 監査台帳APIハンドラー
//!
//! `/api/audit-logs` 系のエンドポイント。スコープ制限なしのアクターのみ利用できる。

use super::error::AppError;
use crate::audit::hash_chain;
use crate::audit::types::{AuditEntry, AuditEntryFilter, ChainVerificationResult, NewAuditEntry};
use crate::common::error::RegistryError;
use crate::types::Actor;
use crate::AppState;
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// チェーン検証の監査アクション名
pub const ACTION_LEDGER_VERIFIED: &str = "audit_ledger.verified";

/// 監査ログ一覧取得のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct AuditLogQueryParams {
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
    /// ページ番号（1始まり、デフォルト: 1）
    pub page: Option<i64>,
    /// ページあたり件数（デフォルト: 50）
    pub per_page: Option<i64>,
}

impl From<AuditLogQueryParams> for AuditEntryFilter {
    fn from(params: AuditLogQueryParams) -> Self {
        Self {
            actor_id: params.actor_id,
            action: params.action,
            target_resource: params.target_resource,
            time_from: params.time_from,
            time_to: params.time_to,
            page: params.page,
            per_page: params.per_page,
        }
    }
}

/// 監査ログ一覧レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLogListResponse {
    /// 監査エントリ一覧（新しい順）
    pub items: Vec<AuditEntry>,
    /// 総件数
    pub total: i64,
    /// 現在のページ番号
    pub page: i64,
    /// ページあたり件数
    pub per_page: i64,
}

/// チェーン検証のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct VerifyQueryParams {
    /// 直近N件のみ検証
    pub limit: Option<i64>,
}

fn require_unrestricted(actor: &Actor) -> Result<(), AppError> {
    if actor.is_restricted() {
        return Err(AppError(RegistryError::ScopeViolation(format!(
            "actor {} may not access the audit ledger",
            actor.id
        ))));
    }
    Ok(())
}

/// GET /api/audit-logs - 監査エントリ一覧取得
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<AuditLogQueryParams>,
) -> Result<Json<AuditLogListResponse>, AppError> {
    require_unrestricted(&actor)?;

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(50).clamp(1, 500);

    let filter: AuditEntryFilter = params.into();
    let storage = &state.audit_log_storage;
    let items = storage.query(&filter).await?;
    let total = storage.count(&filter).await?;

    Ok(Json(AuditLogListResponse {
        items,
        total,
        page,
        per_page,
    }))
}

/// POST /api/audit-logs/verify - ハッシュチェーン検証
///
/// 改ざんを検出しても200で検証結果を返す。検証の実行自体も台帳に記録する。
pub async fn verify_hash_chain(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<VerifyQueryParams>,
) -> Result<Json<ChainVerificationResult>, AppError> {
    require_unrestricted(&actor)?;

    let result = hash_chain::verify_chain(&state.audit_log_storage, params.limit).await?;

    state.audit_log_writer.send(
        NewAuditEntry::new(ACTION_LEDGER_VERIFIED, "audit_entries")
            .with_actor(actor.id.clone())
            .with_details(json!({
                "valid": result.valid,
                "verified": result.verified,
                "total_records": result.total_records,
                "limit": params.limit,
            }))
            .with_client(actor.ip_address.clone(), actor.user_agent.clone()),
    );

    Ok(Json(result))
}
