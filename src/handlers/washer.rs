use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::handlers::{internal_error, lifecycle_error_response, OpResponse};
use crate::models::Booking;
use crate::services::custody::PinType;
use crate::services::{lifecycle, notify};
use crate::state::AppState;

/// Booking as shown to washers. The custody PINs are the user's secret and
/// never appear on this surface.
#[derive(Serialize)]
pub struct WasherBookingView {
    id: i64,
    collection_date: String,
    time_slot: String,
    services: crate::models::ServiceConfig,
    total_cents: i64,
    status: String,
    collection_verified: bool,
    delivery_verified: bool,
    special_instructions: Option<String>,
}

impl WasherBookingView {
    fn from_booking(b: Booking) -> Self {
        Self {
            id: b.id,
            collection_date: b.collection_date.format("%Y-%m-%d %H:%M:%S").to_string(),
            time_slot: b.time_slot.as_str().to_string(),
            services: b.services,
            total_cents: b.total_cents,
            status: b.status.as_str().to_string(),
            collection_verified: b.collection_verified_at.is_some(),
            delivery_verified: b.delivery_verified_at.is_some(),
            special_instructions: b.special_instructions,
        }
    }
}

// POST /api/washer/claim
#[derive(Deserialize)]
pub struct ClaimRequest {
    pub booking_id: i64,
    pub worker_id: i64,
}

pub async fn claim(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ClaimRequest>,
) -> Result<Json<OpResponse>, Response> {
    let transition = {
        let db = state.db.lock().unwrap();
        lifecycle::claim(&db, body.booking_id, body.worker_id)
            .map_err(lifecycle_error_response)?
    };

    notify::publish(&state, &transition).await;

    Ok(OpResponse::ok("booking claimed"))
}

// POST /api/washer/verify-pin
#[derive(Deserialize)]
pub struct VerifyPinRequest {
    pub booking_id: i64,
    pub worker_id: i64,
    pub pin_type: PinType,
    pub pin: String,
}

pub async fn verify_pin(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyPinRequest>,
) -> Result<Json<OpResponse>, Response> {
    let transition = {
        let db = state.db.lock().unwrap();
        lifecycle::verify_pin(&db, body.booking_id, body.worker_id, body.pin_type, &body.pin)
            .map_err(lifecycle_error_response)?
    };

    notify::publish(&state, &transition).await;

    let message = match body.pin_type {
        PinType::Collection => "collection verified, booking in progress",
        PinType::Delivery => "delivery verified, booking completed",
    };
    Ok(OpResponse::ok(message))
}

// GET /api/washer/available
pub async fn available_bookings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<WasherBookingView>>, Response> {
    let bookings = {
        let db = state.db.lock().unwrap();
        queries::get_unassigned_bookings(&db).map_err(internal_error)?
    };

    Ok(Json(
        bookings
            .into_iter()
            .map(WasherBookingView::from_booking)
            .collect(),
    ))
}

// GET /api/washer/:worker_id/bookings
pub async fn assigned_bookings(
    State(state): State<Arc<AppState>>,
    Path(worker_id): Path<i64>,
) -> Result<Json<Vec<WasherBookingView>>, Response> {
    let bookings = {
        let db = state.db.lock().unwrap();
        queries::get_bookings_for_washer(&db, worker_id).map_err(internal_error)?
    };

    Ok(Json(
        bookings
            .into_iter()
            .map(WasherBookingView::from_booking)
            .collect(),
    ))
}
