//! API error type with IntoResponse.
//!
//! Every `DomainError` kind gets its own status code; the JSON body names the
//! kind so clients never have to parse messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;
use serde_json::json;

/// Response extension naming the error kind, read by the metrics middleware.
#[derive(Debug, Clone, Copy)]
pub struct ErrorKind(pub &'static str);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The request could not be decoded at all (400)
    #[error("malformed request: {0}")]
    Malformed(String),

    /// Internal error (500)
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Domain(err) => err.kind(),
            Self::Malformed(_) => "validation_error",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Domain(DomainError::Validation(_)) | Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::Domain(DomainError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Domain(DomainError::StoreConnection(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Domain(DomainError::StoreTimeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Domain(DomainError::PartialFailure { .. }) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = self.status();

        let body = match &self {
            Self::Domain(DomainError::StoreConnection(source)) => {
                tracing::error!(error = %source, "store failure");
                json!({
                    "error": kind,
                    "message": "the message store is unavailable"
                })
            }
            Self::Domain(DomainError::PartialFailure {
                operation,
                committed,
                failed_step,
                source,
            }) => {
                tracing::error!(operation, ?committed, %failed_step, error = %source, "partial failure");
                json!({
                    "error": kind,
                    "message": self.to_string(),
                    "committed_steps": committed,
                    "failed_step": failed_step
                })
            }
            Self::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                json!({
                    "error": kind,
                    "message": "an internal error occurred"
                })
            }
            other => {
                tracing::debug!(error = %other, "request rejected");
                json!({
                    "error": kind,
                    "message": other.to_string()
                })
            }
        };

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(ErrorKind(kind));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use domains::StoreError;
    use std::time::Duration;

    async fn body(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn each_kind_has_its_own_status() {
        let cases = [
            (ApiError::from(DomainError::validation("text is required")), 400),
            (ApiError::from(DomainError::not_found("thread", "t1")), 404),
            (
                ApiError::from(DomainError::StoreConnection(StoreError::Connection("down".into()))),
                503,
            ),
            (ApiError::from(DomainError::StoreTimeout(Duration::from_secs(5))), 504),
            (ApiError::Malformed("bad form".into()), 400),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status().as_u16(), expected);
        }
    }

    #[tokio::test]
    async fn partial_failure_lists_the_steps() {
        let err = ApiError::from(DomainError::PartialFailure {
            operation: "post_reply",
            committed: vec!["insert_reply".into()],
            failed_step: "bump_thread".into(),
            source: Box::new(DomainError::StoreConnection(StoreError::Connection("reset".into()))),
        });

        let (status, json) = body(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "partial_failure");
        assert_eq!(json["committed_steps"], serde_json::json!(["insert_reply"]));
        assert_eq!(json["failed_step"], "bump_thread");
    }

    #[tokio::test]
    async fn store_details_are_not_leaked() {
        let err = ApiError::from(DomainError::StoreConnection(StoreError::Backend(
            "password authentication failed".into(),
        )));
        let (_, json) = body(err).await;
        assert!(!json["message"].as_str().unwrap().contains("password"));
    }
}
