use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::error::BookError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl From<BookError> for ApiError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::NotFound { .. }
            | BookError::UnknownAccount(_)
            | BookError::UnknownContact(_)
            | BookError::UnknownCategory(_)
            | BookError::UnknownPurpose(_)
            | BookError::UnknownSecurity(_)
            | BookError::UnknownSavingsPlan(_) => Self::NotFound(err.to_string()),
            BookError::InvalidDate(_) | BookError::InvalidInput(_) => {
                Self::BadRequest(err.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (BookError::UnknownAccount("x".into()), StatusCode::NOT_FOUND),
            (BookError::NotFound { entity: "draft", id: 1 }, StatusCode::NOT_FOUND),
            (BookError::UnknownSavingsPlan("x".into()), StatusCode::NOT_FOUND),
            (BookError::InvalidDate("x".into()), StatusCode::BAD_REQUEST),
            (BookError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (BookError::Backup("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }
}
