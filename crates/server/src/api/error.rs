//! Mapping from runtime errors onto HTTP responses.

use ac_domain::error::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// Handler error: renders `{ "error": "<message>" }` with a status derived
/// from the error kind.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Validation(_) | Error::UnknownTool(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
        Error::InvalidTransition { .. } => StatusCode::CONFLICT,
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::Engine { .. } | Error::Service { .. } | Error::Http(_) => StatusCode::BAD_GATEWAY,
        Error::Auth(_) => StatusCode::UNAUTHORIZED,
        Error::Canceled(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Io(_) | Error::Config(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self.0, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_statuses() {
        assert_eq!(status_for(&Error::not_found("aicall", "x")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&Error::InvalidTransition {
                from: "terminated".into(),
                to: "pausing".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status_for(&Error::UnknownTool("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&Error::Timeout("turn".into())), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(&Error::engine("openai", "boom")), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(&Error::service("tts", "down")), StatusCode::BAD_GATEWAY);
    }
}
