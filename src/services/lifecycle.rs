use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::LifecycleError;
use crate::models::{Booking, BookingStatus, TransitionKind};
use crate::services::custody::{self, PinType};
use crate::services::policy::{self, PolicyDecision};

/// A successful state transition, ready to be recorded and broadcast. The
/// `completed` and refund-eligible `cancelled` transitions are the single
/// authoritative triggers for downstream payment capture and reversal.
#[derive(Debug, Clone)]
pub struct Transition {
    pub event_id: i64,
    pub event_uid: String,
    pub booking_id: i64,
    pub kind: TransitionKind,
    pub actor_id: i64,
    pub new_status: BookingStatus,
    pub refund_eligible: Option<bool>,
}

#[derive(Debug)]
pub enum CancelOutcome {
    Cancelled(Transition),
    /// The booking is inside the no-refund window and the caller has not yet
    /// confirmed. No mutation was performed; re-invoke with the flag set.
    ConfirmationRequired { message: String },
}

fn load_booking(conn: &Connection, booking_id: i64) -> Result<Booking, LifecycleError> {
    queries::get_booking_by_id(conn, booking_id)?.ok_or(LifecycleError::NotFound)
}

fn record_transition(
    conn: &Connection,
    booking_id: i64,
    kind: TransitionKind,
    actor_id: i64,
    new_status: BookingStatus,
    refund_eligible: Option<bool>,
) -> Result<Transition, LifecycleError> {
    let event_uid = uuid::Uuid::new_v4().to_string();
    let event_id =
        queries::insert_booking_event(conn, &event_uid, booking_id, kind, actor_id, refund_eligible)?;

    tracing::info!(
        booking_id,
        actor_id,
        kind = kind.as_str(),
        status = new_status.as_str(),
        "booking transition"
    );

    Ok(Transition {
        event_id,
        event_uid,
        booking_id,
        kind,
        actor_id,
        new_status,
        refund_eligible,
    })
}

/// Claim Coordinator: at most one washer wins an unassigned booking. The
/// guarantee lives entirely in the conditional UPDATE; losing it is reported
/// as `AlreadyClaimed` so callers know not to retry.
pub fn claim(
    conn: &Connection,
    booking_id: i64,
    worker_id: i64,
) -> Result<Transition, LifecycleError> {
    if queries::is_washer_suspended(conn, worker_id)? {
        return Err(LifecycleError::AccessDenied);
    }

    let booking = load_booking(conn, booking_id)?;
    match booking.status {
        BookingStatus::AwaitingAssignment => {}
        _ if booking.washer_id.is_some() => return Err(LifecycleError::AlreadyClaimed),
        _ => return Err(LifecycleError::InvalidTransition),
    }

    if !queries::claim_booking(conn, booking_id, worker_id)? {
        // Guard failed between read and write: somebody else won, or the
        // booking was cancelled. Re-read to tell the caller which.
        let current = load_booking(conn, booking_id)?;
        if current.washer_id.is_some() {
            return Err(LifecycleError::AlreadyClaimed);
        }
        return Err(LifecycleError::InvalidTransition);
    }

    record_transition(
        conn,
        booking_id,
        TransitionKind::Claimed,
        worker_id,
        BookingStatus::WasherAssigned,
        None,
    )
}

/// Custody Verification Protocol: the assigned washer submits the PIN the
/// user revealed at the physical handover. Collection advances the booking to
/// `in_progress`; delivery completes it. Each PIN is single-use.
pub fn verify_pin(
    conn: &Connection,
    booking_id: i64,
    worker_id: i64,
    pin_type: PinType,
    submitted_pin: &str,
) -> Result<Transition, LifecycleError> {
    custody::validate_pin_format(submitted_pin)?;

    let booking = load_booking(conn, booking_id)?;
    if booking.washer_id != Some(worker_id) {
        return Err(LifecycleError::NotAssigned);
    }

    let (expected_pin, verified_at) = match pin_type {
        PinType::Collection => (&booking.collection_pin, booking.collection_verified_at),
        PinType::Delivery => (&booking.delivery_pin, booking.delivery_verified_at),
    };

    if verified_at.is_some() {
        return Err(LifecycleError::AlreadyVerified);
    }

    // Delivery only after collection; both checks before the PIN comparison
    // so a correct PIN submitted out of order is still rejected.
    match (pin_type, booking.status) {
        (PinType::Collection, BookingStatus::WasherAssigned) => {}
        (PinType::Delivery, BookingStatus::InProgress)
            if booking.collection_verified_at.is_some() => {}
        _ => return Err(LifecycleError::InvalidTransition),
    }

    if submitted_pin != expected_pin {
        return Err(LifecycleError::IncorrectPin);
    }

    let now = Utc::now().naive_utc();
    let (written, kind, new_status) = match pin_type {
        PinType::Collection => (
            queries::mark_collection_verified(conn, booking_id, worker_id, &now)?,
            TransitionKind::CollectionVerified,
            BookingStatus::InProgress,
        ),
        PinType::Delivery => (
            queries::mark_delivery_verified(conn, booking_id, worker_id, &now)?,
            TransitionKind::DeliveryVerified,
            BookingStatus::Completed,
        ),
    };

    if !written {
        let current = load_booking(conn, booking_id)?;
        let already = match pin_type {
            PinType::Collection => current.collection_verified_at.is_some(),
            PinType::Delivery => current.delivery_verified_at.is_some(),
        };
        if already {
            return Err(LifecycleError::AlreadyVerified);
        }
        return Err(LifecycleError::InvalidTransition);
    }

    record_transition(conn, booking_id, kind, worker_id, new_status, None)
}

/// Cancellation gated by the policy engine. Only the owning user may cancel
/// through this path; the admin surface uses [`force_cancel`].
pub fn cancel(
    conn: &Connection,
    booking_id: i64,
    requester_id: i64,
    confirm_no_refund: bool,
    cutoff_hours: f64,
) -> Result<CancelOutcome, LifecycleError> {
    let booking = load_booking(conn, booking_id)?;
    if booking.user_id != requester_id {
        return Err(LifecycleError::AccessDenied);
    }

    apply_cancel(
        conn,
        &booking,
        requester_id,
        confirm_no_refund,
        cutoff_hours,
        &Utc::now().naive_utc(),
    )
}

/// Admin-forced cancellation: skips the ownership check only. The refund
/// decision and the status guard are the same as the user path, with the
/// confirmation round-trip implied.
pub fn force_cancel(
    conn: &Connection,
    booking_id: i64,
    actor_id: i64,
    cutoff_hours: f64,
) -> Result<CancelOutcome, LifecycleError> {
    let booking = load_booking(conn, booking_id)?;
    apply_cancel(
        conn,
        &booking,
        actor_id,
        true,
        cutoff_hours,
        &Utc::now().naive_utc(),
    )
}

fn apply_cancel(
    conn: &Connection,
    booking: &Booking,
    actor_id: i64,
    confirm_no_refund: bool,
    cutoff_hours: f64,
    now: &NaiveDateTime,
) -> Result<CancelOutcome, LifecycleError> {
    match booking.status {
        BookingStatus::Cancelled => return Err(LifecycleError::AlreadyCancelled),
        BookingStatus::Completed => return Err(LifecycleError::NotCancellable),
        _ => {}
    }

    let refund_eligible = match policy::evaluate(
        &booking.collection_date,
        now,
        cutoff_hours,
        confirm_no_refund,
    ) {
        PolicyDecision::CancelWithRefund => true,
        PolicyDecision::CancelWithoutRefund => false,
        PolicyDecision::ConfirmationRequired => {
            return Ok(CancelOutcome::ConfirmationRequired {
                message: policy::confirm_no_refund_message(cutoff_hours),
            });
        }
    };

    if !queries::cancel_booking(conn, booking.id)? {
        let current = load_booking(conn, booking.id)?;
        if current.status == BookingStatus::Cancelled {
            return Err(LifecycleError::AlreadyCancelled);
        }
        return Err(LifecycleError::InvalidTransition);
    }

    let transition = record_transition(
        conn,
        booking.id,
        TransitionKind::Cancelled,
        actor_id,
        BookingStatus::Cancelled,
        Some(refund_eligible),
    )?;
    Ok(CancelOutcome::Cancelled(transition))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, queries::NewBooking};
    use crate::models::{LineItem, ServiceConfig, TimeSlot};
    use chrono::Duration;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn insert_booking(conn: &Connection, user_id: i64, hours_until_collection: i64) -> i64 {
        queries::create_booking(
            conn,
            &NewBooking {
                user_id,
                collection_date: Utc::now().naive_utc()
                    + Duration::hours(hours_until_collection),
                time_slot: TimeSlot::Afternoon,
                services: ServiceConfig {
                    base_service: LineItem {
                        label: "Wash & Fold".to_string(),
                        price_cents: 2500,
                    },
                    items: vec![],
                    add_ons: vec![],
                },
                total_cents: 2500,
                collection_pin: "4821".to_string(),
                delivery_pin: "9310".to_string(),
                special_instructions: None,
                policy_agreed: true,
                terms_agreed: true,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_claim_then_second_claim_already_taken() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 48);

        let t = claim(&conn, id, 100).unwrap();
        assert_eq!(t.kind, TransitionKind::Claimed);
        assert_eq!(t.new_status, BookingStatus::WasherAssigned);

        let err = claim(&conn, id, 200).unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyClaimed));

        let booking = queries::get_booking_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(booking.washer_id, Some(100));
    }

    #[test]
    fn test_suspended_washer_cannot_claim() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 48);
        queries::suspend_washer(&conn, 100, Some("missed handovers")).unwrap();

        let err = claim(&conn, id, 100).unwrap_err();
        assert!(matches!(err, LifecycleError::AccessDenied));

        let booking = queries::get_booking_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::AwaitingAssignment);
    }

    #[test]
    fn test_claim_cancelled_booking_invalid() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 48);
        queries::cancel_booking(&conn, id).unwrap();

        let err = claim(&conn, id, 100).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition));
    }

    #[test]
    fn test_concurrent_claims_exactly_one_winner() {
        use std::sync::{Arc, Mutex};

        let conn = Arc::new(Mutex::new(setup_db()));
        let id = insert_booking(&conn.lock().unwrap(), 7, 48);

        let mut handles = vec![];
        for worker_id in [100i64, 200] {
            let conn = Arc::clone(&conn);
            handles.push(std::thread::spawn(move || {
                let db = conn.lock().unwrap();
                claim(&db, id, worker_id).map(|t| t.actor_id)
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
        assert_eq!(winners.len(), 1, "exactly one claim must win");
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(LifecycleError::AlreadyClaimed))));

        let winner_id = *winners[0].as_ref().unwrap();
        let db = conn.lock().unwrap();
        let booking = queries::get_booking_by_id(&db, id).unwrap().unwrap();
        assert_eq!(booking.washer_id, Some(winner_id));
        assert_eq!(booking.status, BookingStatus::WasherAssigned);
    }

    #[test]
    fn test_collection_pin_single_use() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 48);
        claim(&conn, id, 100).unwrap();

        let t = verify_pin(&conn, id, 100, PinType::Collection, "4821").unwrap();
        assert_eq!(t.new_status, BookingStatus::InProgress);

        let err = verify_pin(&conn, id, 100, PinType::Collection, "4821").unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyVerified));

        let booking = queries::get_booking_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::InProgress);
    }

    #[test]
    fn test_delivery_before_collection_rejected_even_with_correct_pin() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 48);
        claim(&conn, id, 100).unwrap();

        let err = verify_pin(&conn, id, 100, PinType::Delivery, "9310").unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition));
    }

    #[test]
    fn test_incorrect_then_correct_delivery_pin() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 48);
        claim(&conn, id, 100).unwrap();
        verify_pin(&conn, id, 100, PinType::Collection, "4821").unwrap();

        let err = verify_pin(&conn, id, 100, PinType::Delivery, "0000").unwrap_err();
        assert!(matches!(err, LifecycleError::IncorrectPin));
        // The message must not leak the expected PIN.
        assert!(!err.public_message().contains("9310"));

        let booking = queries::get_booking_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::InProgress);

        let t = verify_pin(&conn, id, 100, PinType::Delivery, "9310").unwrap();
        assert_eq!(t.new_status, BookingStatus::Completed);
        assert_eq!(t.kind, TransitionKind::DeliveryVerified);
    }

    #[test]
    fn test_unassigned_washer_cannot_verify() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 48);
        claim(&conn, id, 100).unwrap();

        let err = verify_pin(&conn, id, 200, PinType::Collection, "4821").unwrap_err();
        assert!(matches!(err, LifecycleError::NotAssigned));
    }

    #[test]
    fn test_malformed_pin_checked_first() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 48);
        claim(&conn, id, 100).unwrap();

        // Even the wrong washer gets the format error, nothing else leaks.
        let err = verify_pin(&conn, id, 200, PinType::Collection, "48215").unwrap_err();
        assert!(matches!(err, LifecycleError::MalformedPin));
    }

    #[test]
    fn test_cancel_outside_window_refund_eligible() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 48);

        match cancel(&conn, id, 7, false, 12.0).unwrap() {
            CancelOutcome::Cancelled(t) => {
                assert_eq!(t.refund_eligible, Some(true));
                assert_eq!(t.new_status, BookingStatus::Cancelled);
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[test]
    fn test_cancel_inside_window_two_step() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 5);
        claim(&conn, id, 100).unwrap();

        match cancel(&conn, id, 7, false, 12.0).unwrap() {
            CancelOutcome::ConfirmationRequired { message } => {
                assert!(message.contains("refund"));
            }
            other => panic!("expected confirmation round-trip, got {other:?}"),
        }
        // No mutation on the round-trip.
        let booking = queries::get_booking_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::WasherAssigned);

        match cancel(&conn, id, 7, true, 12.0).unwrap() {
            CancelOutcome::Cancelled(t) => assert_eq!(t.refund_eligible, Some(false)),
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[test]
    fn test_cancel_requires_ownership() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 48);

        let err = cancel(&conn, id, 8, false, 12.0).unwrap_err();
        assert!(matches!(err, LifecycleError::AccessDenied));
    }

    #[test]
    fn test_cancel_is_idempotent_rejection() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 48);
        cancel(&conn, id, 7, false, 12.0).unwrap();

        let err = cancel(&conn, id, 7, false, 12.0).unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyCancelled));
    }

    #[test]
    fn test_completed_booking_not_cancellable() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 48);
        claim(&conn, id, 100).unwrap();
        verify_pin(&conn, id, 100, PinType::Collection, "4821").unwrap();
        verify_pin(&conn, id, 100, PinType::Delivery, "9310").unwrap();

        let err = cancel(&conn, id, 7, true, 12.0).unwrap_err();
        assert!(matches!(err, LifecycleError::NotCancellable));
    }

    #[test]
    fn test_unknown_booking_not_found() {
        let conn = setup_db();
        assert!(matches!(
            claim(&conn, 999, 100).unwrap_err(),
            LifecycleError::NotFound
        ));
        assert!(matches!(
            verify_pin(&conn, 999, 100, PinType::Collection, "1234").unwrap_err(),
            LifecycleError::NotFound
        ));
        assert!(matches!(
            cancel(&conn, 999, 7, false, 12.0).unwrap_err(),
            LifecycleError::NotFound
        ));
    }

    #[test]
    fn test_force_cancel_skips_ownership_only() {
        let conn = setup_db();
        let id = insert_booking(&conn, 7, 5);

        match force_cancel(&conn, id, 1, 12.0).unwrap() {
            CancelOutcome::Cancelled(t) => {
                assert_eq!(t.refund_eligible, Some(false));
                assert_eq!(t.actor_id, 1);
            }
            other => panic!("expected cancellation, got {other:?}"),
        }

        let err = force_cancel(&conn, id, 1, 12.0).unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyCancelled));
    }
}
