use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use merx_core::{CoreError, ErrorCategory};
use merx_shared::error_body::ErrorBody;

#[derive(Debug)]
pub enum AppError {
    Core(CoreError),
    Anyhow(anyhow::Error),
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Core(err) => {
                let status = match err.category() {
                    ErrorCategory::Validation => StatusCode::BAD_REQUEST,
                    ErrorCategory::Conflict => StatusCode::CONFLICT,
                    ErrorCategory::NotFound => StatusCode::NOT_FOUND,
                    ErrorCategory::Payment => StatusCode::PAYMENT_REQUIRED,
                    ErrorCategory::Forbidden => StatusCode::FORBIDDEN,
                    ErrorCategory::Internal => {
                        tracing::error!("Internal error: {}", err);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.to_body())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("Internal Server Error", "INTERNAL_ERROR"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_errors_map_to_402() {
        let resp = AppError::from(CoreError::MissingCredential).into_response();
        assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn test_state_conflicts_map_to_409() {
        let err = CoreError::InvalidState("completed".into(), "session is terminal".into());
        let resp = AppError::from(err).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
