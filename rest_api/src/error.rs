// rest_api/src/error.rs
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use models::MedError;
use security::AuthError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum RestApiError {
    #[error(transparent)]
    Service(#[from] MedError),
    #[error("{0}")]
    Auth(AuthError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for RestApiError {
    fn from(err: AuthError) -> Self {
        RestApiError::Auth(err)
    }
}

impl From<JsonRejection> for RestApiError {
    fn from(rejection: JsonRejection) -> Self {
        RestApiError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for RestApiError {
    fn from(rejection: PathRejection) -> Self {
        RestApiError::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for RestApiError {
    fn from(rejection: QueryRejection) -> Self {
        RestApiError::InvalidInput(rejection.body_text())
    }
}

fn service_status(err: &MedError) -> StatusCode {
    match err {
        MedError::NotFound { .. } => StatusCode::NOT_FOUND,
        MedError::AlreadyExists(_) | MedError::Conflict(_) => StatusCode::CONFLICT,
        MedError::InvalidData(_) | MedError::Validation(_) | MedError::Uuid(_) => StatusCode::BAD_REQUEST,
        MedError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
        MedError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        MedError::LimitExceeded(_) => StatusCode::PAYMENT_REQUIRED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNAUTHORIZED,
    }
}

impl RestApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            RestApiError::Service(e) => service_status(e),
            RestApiError::Auth(e) => auth_status(e),
            RestApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RestApiError::NotFound(_) => StatusCode::NOT_FOUND,
            RestApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RestApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Storage and serialization details stay in the log.
            error!("request failed: {}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = Json(json!({
            "status": "error",
            "message": message,
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, RestApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use models::ValidationError;

    #[test]
    fn maps_service_errors_to_statuses() {
        let cases = [
            (MedError::not_found("Appointment", "1"), StatusCode::NOT_FOUND),
            (MedError::Conflict("slot is fully booked".into()), StatusCode::CONFLICT),
            (MedError::Validation(ValidationError::InvalidTimeRange), StatusCode::BAD_REQUEST),
            (MedError::PermissionDenied("no".into()), StatusCode::FORBIDDEN),
            (MedError::LimitExceeded("doctors".into()), StatusCode::PAYMENT_REQUIRED),
            (MedError::StorageError("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(RestApiError::from(err).status(), status);
        }
        assert_eq!(RestApiError::from(AuthError::TokenExpired).status(), StatusCode::UNAUTHORIZED);
    }
}
