//! 不正レビューAPIハンドラー
//!
//! `/api/fraud-detections` 系のエンドポイント

use super::error::AppError;
use crate::fraud::{BulkResolveOutcome, BulkResolveRequest, Cluster};
use crate::types::Actor;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

/// クラスタ一覧レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ClusterListResponse {
    /// クラスタ（メンバー数降順）
    pub clusters: Vec<Cluster>,
}

/// GET /api/fraud-detections/clusters - 未レビューの近接クラスタ一覧
pub async fn list_clusters(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<ClusterListResponse>, AppError> {
    let clusters = state.review.get_clusters(&actor).await?;
    Ok(Json(ClusterListResponse { clusters }))
}

/// POST /api/fraud-detections/bulk-review - 一括レビュー
pub async fn bulk_review(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<BulkResolveRequest>, JsonRejection>,
) -> Result<Json<BulkResolveOutcome>, AppError> {
    let Json(request) = payload?;
    let outcome = state.review.resolve_many(&request, &actor).await?;
    Ok(Json(outcome))
}
