use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::{internal_error, lifecycle_error_response, OpResponse};
use crate::models::BookingEvent;
use crate::services::lifecycle::{self, CancelOutcome};
use crate::services::notify;
use crate::state::AppState;

#[allow(clippy::result_large_err)]
fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), Response> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized.into_response());
    }
    Ok(())
}

// GET /api/admin/status
#[derive(Serialize)]
pub struct StatusResponse {
    awaiting_assignment: i64,
    washer_assigned: i64,
    in_progress: i64,
    completed: i64,
    cancelled: i64,
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let counts = {
        let db = state.db.lock().unwrap();
        queries::get_status_counts(&db).map_err(internal_error)?
    };

    Ok(Json(StatusResponse {
        awaiting_assignment: counts.awaiting_assignment,
        washer_assigned: counts.washer_assigned,
        in_progress: counts.in_progress,
        completed: counts.completed,
        cancelled: counts.cancelled,
    }))
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<super::bookings::BookingResponse>>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(50);
    let status_filter = query.status.as_deref();

    let bookings = {
        let db = state.db.lock().unwrap();
        queries::get_all_bookings(&db, status_filter, limit).map_err(internal_error)?
    };

    Ok(Json(
        bookings
            .into_iter()
            .map(super::bookings::BookingResponse::from_booking)
            .collect(),
    ))
}

// GET /api/admin/activity
#[derive(Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

pub async fn get_activity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<BookingEvent>>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let events = {
        let db = state.db.lock().unwrap();
        queries::get_recent_events(&db, query.limit.unwrap_or(50)).map_err(internal_error)?
    };

    Ok(Json(events))
}

// POST /api/admin/bookings/:id/cancel
//
// Audited force cancellation: same status guard and refund rule as the user
// path, ownership check skipped. The audit record is the booking event row.
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<OpResponse>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let outcome = {
        let db = state.db.lock().unwrap();
        lifecycle::force_cancel(&db, id, 0, state.config.cancellation_cutoff_hours)
            .map_err(lifecycle_error_response)?
    };

    match outcome {
        CancelOutcome::Cancelled(transition) => {
            tracing::info!(booking_id = id, "booking force-cancelled by admin");
            notify::publish(&state, &transition).await;
            Ok(OpResponse::ok("booking cancelled"))
        }
        CancelOutcome::ConfirmationRequired { .. } => {
            // Unreachable: force_cancel always confirms.
            Err(internal_error(anyhow::anyhow!(
                "force cancel returned confirmation round-trip"
            )))
        }
    }
}

// GET /api/admin/washers/suspended
#[derive(Serialize)]
pub struct SuspendedWasher {
    worker_id: i64,
    reason: Option<String>,
}

pub async fn get_suspended_washers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SuspendedWasher>>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let suspended = {
        let db = state.db.lock().unwrap();
        queries::list_suspended_washers(&db).map_err(internal_error)?
    };

    Ok(Json(
        suspended
            .into_iter()
            .map(|(worker_id, reason)| SuspendedWasher { worker_id, reason })
            .collect(),
    ))
}

// POST /api/admin/washers/suspend
#[derive(Deserialize)]
pub struct SuspendRequest {
    pub worker_id: i64,
    pub reason: Option<String>,
}

pub async fn suspend_washer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SuspendRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    {
        let db = state.db.lock().unwrap();
        queries::suspend_washer(&db, body.worker_id, body.reason.as_deref())
            .map_err(internal_error)?;
    }

    tracing::info!(worker_id = body.worker_id, "washer suspended");
    Ok(Json(serde_json::json!({"ok": true})))
}

// POST /api/admin/washers/reinstate
#[derive(Deserialize)]
pub struct ReinstateRequest {
    pub worker_id: i64,
}

pub async fn reinstate_washer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ReinstateRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    check_auth(&headers, &state.config.admin_token)?;

    let reinstated = {
        let db = state.db.lock().unwrap();
        queries::reinstate_washer(&db, body.worker_id).map_err(internal_error)?
    };

    if reinstated {
        Ok(Json(serde_json::json!({"ok": true})))
    } else {
        Err(AppError::NotFound("washer is not suspended".to_string()).into_response())
    }
}
