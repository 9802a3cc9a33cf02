//! APIエラーレスポンス型
//!
//! axum用の共通エラーハンドリング

use crate::common::error::RegistryError;
use axum::{extract::rejection::JsonRejection, response::IntoResponse, Json};

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(pub RegistryError);

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError(err)
    }
}

/// ボディの構文・型不一致は400のvalidation_errorとして返す
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError(RegistryError::validation(rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        // 詳細はサーバーログのみ。クライアントにはexternal_message()を返す
        if status.is_server_error() {
            tracing::error!(error_type = self.0.error_type(), "Request failed: {}", self.0);
        } else {
            tracing::warn!(error_type = self.0.error_type(), "Request rejected: {}", self.0);
        }

        (status, Json(self.0.to_error_response())).into_response()
    }
}
