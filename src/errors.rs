use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Outcome kinds for booking lifecycle operations. Every variant except
/// `Storage` is an expected business outcome and is recovered at the handler
/// boundary into a structured `{success, message}` payload.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("booking not found")]
    NotFound,

    #[error("you do not have access to this booking")]
    AccessDenied,

    #[error("this booking is not assigned to you")]
    NotAssigned,

    #[error("this action is not valid for the booking's current state")]
    InvalidTransition,

    #[error("this booking has already been claimed by another washer")]
    AlreadyClaimed,

    #[error("this PIN has already been verified")]
    AlreadyVerified,

    #[error("PIN must be exactly 4 digits")]
    MalformedPin,

    // Deliberately does not distinguish wrong-booking from wrong-digits.
    #[error("incorrect PIN")]
    IncorrectPin,

    #[error("this booking has already been cancelled")]
    AlreadyCancelled,

    #[error("completed bookings cannot be cancelled")]
    NotCancellable,

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl LifecycleError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LifecycleError::NotFound => StatusCode::NOT_FOUND,
            LifecycleError::AccessDenied | LifecycleError::NotAssigned => StatusCode::FORBIDDEN,
            LifecycleError::MalformedPin => StatusCode::BAD_REQUEST,
            LifecycleError::IncorrectPin => StatusCode::UNPROCESSABLE_ENTITY,
            LifecycleError::InvalidTransition
            | LifecycleError::AlreadyClaimed
            | LifecycleError::AlreadyVerified
            | LifecycleError::AlreadyCancelled
            | LifecycleError::NotCancellable => StatusCode::CONFLICT,
            LifecycleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the caller. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            LifecycleError::Storage(_) => "internal error, please try again".to_string(),
            other => other.to_string(),
        }
    }
}

/// Infrastructure-level failures for plain request/response handlers. The
/// lifecycle operations use [`LifecycleError`] instead so business outcomes
/// keep their structured shape.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
