//! REST APIハンドラー
//!
//! ドメイン処理は`fraud`・`audit`にあり、ここではHTTPとの変換のみを行う。

/// APIエラーレスポンス
pub mod error;

/// 操作主体の特定
pub mod actor;

/// 不正レビューAPI
pub mod fraud;

/// 監査台帳API
pub mod audit_log;

use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

/// APIルーターを構築
///
/// `/api`配下はすべてアクターの特定を必須とする。`/health`は認証不要。
pub fn create_app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/fraud-detections/clusters", get(fraud::list_clusters))
        .route("/fraud-detections/bulk-review", post(fraud::bulk_review))
        .route("/audit-logs", get(audit_log::list_audit_logs))
        .route("/audit-logs/verify", post(audit_log::verify_hash_chain))
        .layer(middleware::from_fn(actor::actor_middleware));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - DB疎通確認
///
/// シャットダウン要求後は新規トラフィックを受けないよう503を返す。
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if state.shutdown.is_shutdown_requested() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "shutting_down"})),
        );
    }
    match sqlx::query("SELECT 1").execute(&state.db_pool).await {
        Ok(_) => (StatusCode::OK, Json(json!({"status": "ok"}))),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unavailable"})),
            )
        }
    }
}
