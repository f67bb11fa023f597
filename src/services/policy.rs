use chrono::NaiveDateTime;

/// What the cancellation policy decided for a request arriving at a given
/// moment. `ConfirmationRequired` is a protocol round-trip, not an error: the
/// caller must re-submit with the no-refund confirmation flag to proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    CancelWithRefund,
    CancelWithoutRefund,
    ConfirmationRequired,
}

/// Single rule: a cancellation at or beyond the cutoff (default 12 hours
/// before collection) is fully refundable; inside the window it requires an
/// explicit confirmation and forfeits the refund.
pub fn evaluate(
    collection_date: &NaiveDateTime,
    now: &NaiveDateTime,
    cutoff_hours: f64,
    confirm_no_refund: bool,
) -> PolicyDecision {
    let hours_until_collection = (*collection_date - *now).num_seconds() as f64 / 3600.0;

    if hours_until_collection >= cutoff_hours {
        PolicyDecision::CancelWithRefund
    } else if confirm_no_refund {
        PolicyDecision::CancelWithoutRefund
    } else {
        PolicyDecision::ConfirmationRequired
    }
}

pub fn confirm_no_refund_message(cutoff_hours: f64) -> String {
    format!(
        "This booking is within {cutoff_hours} hours of collection and is no longer \
         refundable. Confirm the cancellation to proceed without a refund."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-06-16 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_exactly_at_cutoff_is_refundable() {
        let now = base();
        let collection = now + Duration::hours(12);
        assert_eq!(
            evaluate(&collection, &now, 12.0, false),
            PolicyDecision::CancelWithRefund
        );
    }

    #[test]
    fn test_just_inside_window_requires_confirmation() {
        let now = base();
        // 11.999 hours away: 12h minus ~4 seconds.
        let collection = now + Duration::hours(12) - Duration::seconds(4);
        assert_eq!(
            evaluate(&collection, &now, 12.0, false),
            PolicyDecision::ConfirmationRequired
        );
    }

    #[test]
    fn test_inside_window_with_confirmation_forfeits_refund() {
        let now = base();
        let collection = now + Duration::hours(5);
        assert_eq!(
            evaluate(&collection, &now, 12.0, true),
            PolicyDecision::CancelWithoutRefund
        );
    }

    #[test]
    fn test_far_out_ignores_confirmation_flag() {
        let now = base();
        let collection = now + Duration::hours(48);
        assert_eq!(
            evaluate(&collection, &now, 12.0, false),
            PolicyDecision::CancelWithRefund
        );
        assert_eq!(
            evaluate(&collection, &now, 12.0, true),
            PolicyDecision::CancelWithRefund
        );
    }

    #[test]
    fn test_past_collection_date_still_cancellable_without_refund() {
        let now = base();
        let collection = now - Duration::hours(1);
        assert_eq!(
            evaluate(&collection, &now, 12.0, false),
            PolicyDecision::ConfirmationRequired
        );
        assert_eq!(
            evaluate(&collection, &now, 12.0, true),
            PolicyDecision::CancelWithoutRefund
        );
    }

    #[test]
    fn test_custom_cutoff() {
        let now = base();
        let collection = now + Duration::hours(18);
        assert_eq!(
            evaluate(&collection, &now, 24.0, false),
            PolicyDecision::ConfirmationRequired
        );
    }
}
