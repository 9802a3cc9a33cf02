//! 不正レビュー
//!
//! GPS近接クラスタの算出と、スコープ制限付きの一括レビュー

/// Union-Findによる近接クラスタ算出
pub mod cluster;

/// 一括レビュー要求の検証
pub mod bulk;

/// レビューサービス（クラスタ一覧・一括レビュー）
pub mod service;

pub use bulk::{BulkResolveOutcome, BulkResolveRequest};
pub use cluster::{build_clusters, Cluster};
pub use service::FraudReviewService;
