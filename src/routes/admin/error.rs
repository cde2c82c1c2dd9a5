use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{api_types::ErrorResponse, db::DbError, services::ProviderServiceError};

#[derive(Debug)]
pub enum AdminError {
    NotFound(String),
    Conflict(String),
    Validation(String),
    Unauthorized,
    Database(DbError),
}

impl From<DbError> for AdminError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => AdminError::NotFound("Resource not found".to_string()),
            DbError::Conflict(msg) => AdminError::Conflict(msg),
            DbError::Validation(msg) => AdminError::Validation(msg),
            _ => AdminError::Database(err),
        }
    }
}

impl From<ProviderServiceError> for AdminError {
    fn from(err: ProviderServiceError) -> Self {
        match err {
            ProviderServiceError::NotFound => {
                AdminError::NotFound("OIDC provider not found".to_string())
            }
            ProviderServiceError::Conflict(msg) => AdminError::Conflict(msg),
            ProviderServiceError::Database(db_err) => AdminError::from(db_err),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, code, message, error_type) = match self {
            AdminError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "not_found", msg, "not_found_error")
            }
            AdminError::Conflict(msg) => {
                (StatusCode::CONFLICT, "conflict", msg, "invalid_request_error")
            }
            AdminError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg,
                "invalid_request_error",
            ),
            AdminError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized".to_string(),
                "authentication_error",
            ),
            AdminError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal database error occurred".to_string(),
                    "server_error",
                )
            }
        };

        (
            status,
            Json(ErrorResponse::with_type(error_type, code, message)),
        )
            .into_response()
    }
}
