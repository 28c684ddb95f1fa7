use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use trigger::UploaderError;

/// HTTP face of an [`UploaderError`].
#[derive(Debug)]
pub struct ApiError(pub UploaderError);

impl From<UploaderError> for ApiError {
    fn from(err: UploaderError) -> Self {
        Self(err)
    }
}

/// Error body returned to the event delivery service.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    /// Whether redelivering the same event could succeed.
    pub retryable: bool,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            UploaderError::MalformedEvent { .. } => StatusCode::BAD_REQUEST,
            UploaderError::MetadataIncomplete(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UploaderError::StorageAccess(_) | UploaderError::Dispatch(_) => StatusCode::BAD_GATEWAY,
            UploaderError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let policy = self.0.retry_policy();
        let body = ErrorBody {
            error: self.0.to_string(),
            retryable: policy.is_retryable(),
        };
        // Upstream back-off hints are passed on to the delivery service.
        let mut headers = HeaderMap::new();
        if let Some(after) = policy.after() {
            headers.insert(RETRY_AFTER, HeaderValue::from(after.as_secs()));
        }
        tracing::warn!(
            status = status.as_u16(),
            retryable = body.retryable,
            error = %body.error,
            "invocation failed"
        );
        (status, headers, Json(body)).into_response()
    }
}
