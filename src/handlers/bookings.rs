use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, NewBooking};
use crate::errors::AppError;
use crate::handlers::{internal_error, lifecycle_error_response, OpResponse};
use crate::models::{Booking, ServiceConfig, TimeSlot};
use crate::services::lifecycle::CancelOutcome;
use crate::services::{custody, lifecycle, notify};
use crate::state::AppState;

/// Booking as shown to its owner. Includes both custody PINs: the user is
/// the holder and reveals each one only at the physical handover.
#[derive(Serialize)]
pub struct BookingResponse {
    id: i64,
    user_id: i64,
    washer_id: Option<i64>,
    collection_date: String,
    time_slot: String,
    services: ServiceConfig,
    total_cents: i64,
    status: String,
    collection_pin: String,
    delivery_pin: String,
    collection_verified_at: Option<String>,
    delivery_verified_at: Option<String>,
    special_instructions: Option<String>,
    created_at: String,
}

impl BookingResponse {
    pub fn from_booking(b: Booking) -> Self {
        let fmt = |dt: NaiveDateTime| dt.format("%Y-%m-%d %H:%M:%S").to_string();
        Self {
            id: b.id,
            user_id: b.user_id,
            washer_id: b.washer_id,
            collection_date: fmt(b.collection_date),
            time_slot: b.time_slot.as_str().to_string(),
            services: b.services,
            total_cents: b.total_cents,
            status: b.status.as_str().to_string(),
            collection_pin: b.collection_pin,
            delivery_pin: b.delivery_pin,
            collection_verified_at: b.collection_verified_at.map(fmt),
            delivery_verified_at: b.delivery_verified_at.map(fmt),
            special_instructions: b.special_instructions,
            created_at: fmt(b.created_at),
        }
    }
}

fn bad_request(message: &str) -> Response {
    AppError::BadRequest(message.to_string()).into_response()
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub user_id: i64,
    pub collection_date: String,
    pub time_slot: String,
    pub services: ServiceConfig,
    pub special_instructions: Option<String>,
    pub policy_agreed: bool,
    pub terms_agreed: bool,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), Response> {
    if !body.policy_agreed || !body.terms_agreed {
        return Err(bad_request(
            "cancellation policy and terms must be agreed at booking time",
        ));
    }

    let collection_date = NaiveDateTime::parse_from_str(&body.collection_date, "%Y-%m-%d %H:%M:%S")
        .map_err(|_| bad_request("collection_date must be YYYY-MM-DD HH:MM:SS"))?;

    let time_slot = TimeSlot::parse(&body.time_slot)
        .ok_or_else(|| bad_request("time_slot must be morning, afternoon or evening"))?;

    // Total is computed from the closed services shape, never client-supplied.
    let total_cents = body.services.total_cents();
    if total_cents <= 0 {
        return Err(bad_request("services must have a positive total"));
    }

    let new_booking = NewBooking {
        user_id: body.user_id,
        collection_date,
        time_slot,
        services: body.services,
        total_cents,
        collection_pin: custody::generate_pin(),
        delivery_pin: custody::generate_pin(),
        special_instructions: body.special_instructions,
        policy_agreed: body.policy_agreed,
        terms_agreed: body.terms_agreed,
    };

    let booking = {
        let db = state.db.lock().unwrap();
        let id = queries::create_booking(&db, &new_booking).map_err(internal_error)?;
        queries::get_booking_by_id(&db, id)
            .map_err(internal_error)?
            .ok_or_else(|| internal_error(anyhow::anyhow!("booking vanished after insert")))?
    };

    tracing::info!(booking_id = booking.id, user_id = booking.user_id, "booking created");

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse::from_booking(booking)),
    ))
}

// GET /api/bookings/:id
#[derive(Deserialize)]
pub struct OwnerQuery {
    pub user_id: i64,
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<BookingResponse>, Response> {
    let booking = {
        let db = state.db.lock().unwrap();
        queries::get_booking_by_id(&db, id).map_err(internal_error)?
    };

    // Non-owners get the same answer as a missing booking.
    match booking {
        Some(b) if b.user_id == query.user_id => Ok(Json(BookingResponse::from_booking(b))),
        _ => Err(AppError::NotFound("booking not found".to_string()).into_response()),
    }
}

// GET /api/users/:user_id/bookings
pub async fn user_bookings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<BookingResponse>>, Response> {
    let bookings = {
        let db = state.db.lock().unwrap();
        queries::get_bookings_for_user(&db, user_id).map_err(internal_error)?
    };

    Ok(Json(
        bookings
            .into_iter()
            .map(BookingResponse::from_booking)
            .collect(),
    ))
}

// POST /api/bookings/:id/cancel
#[derive(Deserialize)]
pub struct CancelRequest {
    pub requester_id: i64,
    #[serde(default)]
    pub confirm_no_refund: bool,
}

pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<OpResponse>, Response> {
    let outcome = {
        let db = state.db.lock().unwrap();
        lifecycle::cancel(
            &db,
            id,
            body.requester_id,
            body.confirm_no_refund,
            state.config.cancellation_cutoff_hours,
        )
        .map_err(lifecycle_error_response)?
    };

    match outcome {
        CancelOutcome::Cancelled(transition) => {
            let message = if transition.refund_eligible == Some(true) {
                "booking cancelled, refund will be issued"
            } else {
                "booking cancelled without refund"
            };
            notify::publish(&state, &transition).await;
            Ok(OpResponse::ok(message))
        }
        // A protocol round-trip, not an error: the caller re-invokes with
        // confirm_no_refund set.
        CancelOutcome::ConfirmationRequired { message } => Ok(Json(OpResponse {
            success: false,
            message,
            code: Some("CONFIRM_NO_REFUND".to_string()),
        })),
    }
}
