//! 不正検知レコードの型定義
//!
//! スコアリングエンジンが出力したフラグ付き提出データを表す

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 深刻度
///
/// 宣言順が順序になる（clean < low < medium < high < critical）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// 問題なし
    Clean,
    /// 低
    Low,
    /// 中
    Medium,
    /// 高
    High,
    /// 重大
    Critical,
}

impl Severity {
    /// Severityを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clean" => Ok(Self::Clean),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// レビュー結果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// 不正と確定
    ConfirmedFraud,
    /// 誤検知
    FalsePositive,
    /// 追加調査が必要
    NeedsInvestigation,
    /// 却下
    Dismissed,
    /// 調査員へ警告済み
    EnumeratorWarned,
    /// 調査員を停止
    EnumeratorSuspended,
}

impl Resolution {
    /// 許可されている全値
    pub const ALL: [Resolution; 6] = [
        Self::ConfirmedFraud,
        Self::FalsePositive,
        Self::NeedsInvestigation,
        Self::Dismissed,
        Self::EnumeratorWarned,
        Self::EnumeratorSuspended,
    ];

    /// Resolutionを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmedFraud => "confirmed_fraud",
            Self::FalsePositive => "false_positive",
            Self::NeedsInvestigation => "needs_investigation",
            Self::Dismissed => "dismissed",
            Self::EnumeratorWarned => "enumerator_warned",
            Self::EnumeratorSuspended => "enumerator_suspended",
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown resolution '{}'", s))
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 近接判定された他の提出データへの参照
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProximityRef {
    /// 提出ID
    pub submission_id: String,
    /// 緯度
    pub lat: f64,
    /// 経度
    pub lng: f64,
    /// 観測時刻
    pub observed_at: DateTime<Utc>,
}

/// ヒューリスティック別スコア
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ComponentScores {
    /// GPS近接クラスタ
    pub gps_cluster: f64,
    /// 移動速度
    pub speed: f64,
    /// 直線回答
    pub straightline: f64,
    /// 重複回答
    pub duplicate: f64,
    /// 回答時間
    pub timing: f64,
}

/// フラグ付き検知レコード
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlaggedDetection {
    /// 検知ID
    pub id: String,
    /// 提出ID
    pub submission_id: String,
    /// 提出者（調査員）ID
    pub owner_id: String,
    /// 提出者の表示名
    pub owner_name: Option<String>,
    /// スコア算出時刻
    pub computed_at: DateTime<Utc>,
    /// 提出地点の緯度
    pub latitude: Option<f64>,
    /// 提出地点の経度
    pub longitude: Option<f64>,
    /// ヒューリスティック別スコア
    pub scores: ComponentScores,
    /// 合計スコア
    pub total_score: f64,
    /// 深刻度
    pub severity: Severity,
    /// レビュー結果（未レビューはNone）
    pub resolution: Option<Resolution>,
    /// レビューメモ
    pub resolution_notes: Option<String>,
    /// レビュー者ID
    pub reviewed_by: Option<String>,
    /// レビュー時刻
    pub reviewed_at: Option<DateTime<Utc>>,
    /// 近接提出データ
    pub proximity_refs: Vec<ProximityRef>,
}

/// 一括レビューで適用する更新内容
#[derive(Debug, Clone)]
pub struct ResolutionPatch {
    /// 設定するレビュー結果
    pub resolution: Resolution,
    /// レビューメモ
    pub notes: String,
    /// レビュー者ID
    pub reviewed_by: String,
    /// レビュー時刻
    pub reviewed_at: DateTime<Utc>,
}
