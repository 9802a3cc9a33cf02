//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! `RegistryError`は`error_type()`と`status_code()`を提供し、
//! 呼び出し側がクライアント向けステータスに写像できるようにする。
//! 検証エラー・未検出・スコープ違反・一時的ストアエラーはそれぞれ別の分類になる。

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Common layer error type
#[derive(Debug, Error)]
pub enum CommonError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// registry core error type
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Common layer error
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Resource not found (IDの一部が存在しない場合も含む)
    #[error("Not found: {0}")]
    NotFound(String),

    /// スコープ制限付きアクターに割り当てがない
    #[error("No scope: {0}")]
    NoScope(String),

    /// スコープ外の行が含まれている
    #[error("Scope violation: {0}")]
    ScopeViolation(String),

    /// ハッシュチェーン検証で改ざんを検出（検証レポート経由でのみ発生）
    #[error("Ledger integrity error: {0}")]
    LedgerIntegrity(String),

    /// ロック待ちタイムアウト・接続断など再試行可能なストアエラー
    #[error("Transient store error: {0}")]
    Transient(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Authentication error
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// registry core result type
pub type RegistryResult<T> = Result<T, RegistryError>;

impl RegistryError {
    /// 検証エラーを生成
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Common(CommonError::Validation(message.into()))
    }

    /// sqlxエラーを分類して変換する
    ///
    /// SQLITE_BUSY / SQLITE_LOCKED 系・プールタイムアウト・I/O断は`Transient`、
    /// それ以外は`Database`になる。
    pub fn from_sqlx(context: &str, err: sqlx::Error) -> Self {
        if is_transient_sqlx_error(&err) {
            Self::Transient(format!("{}: {}", context, err))
        } else {
            Self::Database(format!("{}: {}", context, err))
        }
    }

    /// 再試行で回復し得るエラーか
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns a safe error message for external clients.
    ///
    /// Validation messages are returned verbatim because they describe the
    /// caller's own input. Everything else is reduced to a fixed phrase; the
    /// `Display` form with full details only goes to server logs.
    pub fn external_message(&self) -> String {
        match self {
            Self::Common(CommonError::Validation(msg)) => msg.clone(),
            Self::Common(_) => "Request error".to_string(),
            Self::NotFound(_) => "One or more records were not found".to_string(),
            Self::NoScope(_) => "No team assignment for this reviewer".to_string(),
            Self::ScopeViolation(_) => {
                "One or more records are outside your assigned scope".to_string()
            }
            Self::LedgerIntegrity(_) => "Audit ledger integrity check failed".to_string(),
            Self::Transient(_) => "Service temporarily unavailable, retry".to_string(),
            Self::Database(_) => "Database error".to_string(),
            Self::Authentication(_) => "Authentication required".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Returns the machine-readable error type string.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Common(CommonError::Validation(_)) => "validation_error",
            Self::Common(_) => "invalid_request_error",
            Self::NotFound(_) => "not_found",
            Self::NoScope(_) => "no_scope",
            Self::ScopeViolation(_) => "scope_violation",
            Self::LedgerIntegrity(_) => "ledger_integrity",
            Self::Transient(_) => "transient_store_error",
            Self::Database(_) => "server_error",
            Self::Authentication(_) => "authentication_error",
            Self::Internal(_) => "server_error",
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Common(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NoScope(_) => StatusCode::FORBIDDEN,
            Self::ScopeViolation(_) => StatusCode::FORBIDDEN,
            Self::LedgerIntegrity(_) => StatusCode::CONFLICT,
            Self::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts this error to a client-facing error body.
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                message: self.external_message(),
                error_type: self.error_type().to_string(),
                code: Some(self.status_code().as_u16().to_string()),
            },
        }
    }
}

fn is_transient_sqlx_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db_err) => {
            // 拡張リザルトコードの下位8bitが一次コード（5=BUSY, 6=LOCKED）
            let primary = db_err
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| code & 0xff);
            matches!(primary, Some(5) | Some(6))
        }
        _ => false,
    }
}

/// クライアント向けエラーレスポンス
///
/// ```json
/// {
///   "error": {
///     "message": "One or more records are outside your assigned scope",
///     "type": "scope_violation",
///     "code": "403"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// The error details
    pub error: ErrorDetail,
}

/// エラー詳細
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    /// Human-readable error message
    pub message: String,
    /// Error type (e.g., "validation_error", "scope_violation")
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error code (HTTP status as string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
