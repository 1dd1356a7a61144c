use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use keeper_core::error::KeeperError;

/// Request-level error that maps onto the protocol's JSON error envelope:
/// `{error: {code, message}}` with the matching HTTP status.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
    Unsupported(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "bad request: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
            Self::Unsupported(msg) => write!(f, "unsupported: {msg}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Self::Unsupported(msg) => (StatusCode::NOT_IMPLEMENTED, msg),
        };
        tracing::error!(status = %status, error = %message);
        (
            status,
            Json(serde_json::json!({
                "error": { "code": status.as_u16(), "message": message }
            })),
        )
            .into_response()
    }
}

impl From<KeeperError> for ApiError {
    fn from(e: KeeperError) -> Self {
        match e {
            KeeperError::BlockNotFound(hash) => Self::NotFound(format!("unknown digest {hash}")),
            KeeperError::InvalidDigest(_)
            | KeeperError::InvalidHostname(_)
            | KeeperError::UnknownCompressionType(_)
            | KeeperError::Filter(_)
            | KeeperError::MalformedRecord(_) => Self::BadRequest(e.to_string()),
            KeeperError::Config(_) => Self::Unsupported(e.to_string()),
            KeeperError::Io(_) | KeeperError::Decompression(_) => Self::Internal(e.to_string()),
        }
    }
}
