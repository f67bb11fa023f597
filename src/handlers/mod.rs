pub mod admin;
pub mod bookings;
pub mod events;
pub mod health;
pub mod washer;

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::errors::{AppError, LifecycleError};

/// Boundary contract for the state-mutating operations: a success flag and a
/// human-readable message, plus an optional protocol code. Business outcomes
/// are never surfaced as unhandled faults.
#[derive(Serialize)]
pub struct OpResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl OpResponse {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            code: None,
        })
    }
}

pub fn lifecycle_error_response(err: LifecycleError) -> Response {
    if let LifecycleError::Storage(ref e) = err {
        tracing::error!(error = %e, "storage failure during booking operation");
    }

    let status = err.status_code();
    let body = OpResponse {
        success: false,
        message: err.public_message(),
        code: None,
    };
    (status, Json(body)).into_response()
}

pub fn internal_error(e: anyhow::Error) -> Response {
    AppError::Internal(e).into_response()
}
