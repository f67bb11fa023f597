use serde::{Deserialize, Serialize};

/// A successful lifecycle transition, recorded in `booking_events` and pushed
/// to the SSE stream and the webhook notifier. The `completed` and
/// `cancelled` kinds are the authoritative triggers for downstream payment
/// capture and reversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEvent {
    pub id: i64,
    pub event_uid: String,
    pub booking_id: i64,
    pub kind: TransitionKind,
    pub actor_id: i64,
    pub refund_eligible: Option<bool>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Claimed,
    CollectionVerified,
    DeliveryVerified,
    Cancelled,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Claimed => "claimed",
            TransitionKind::CollectionVerified => "collection_verified",
            TransitionKind::DeliveryVerified => "delivery_verified",
            TransitionKind::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "claimed" => Some(TransitionKind::Claimed),
            "collection_verified" => Some(TransitionKind::CollectionVerified),
            "delivery_verified" => Some(TransitionKind::DeliveryVerified),
            "cancelled" => Some(TransitionKind::Cancelled),
            _ => None,
        }
    }
}
