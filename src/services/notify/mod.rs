pub mod webhook;

use async_trait::async_trait;
use chrono::Utc;

use crate::models::BookingEvent;
use crate::services::lifecycle::Transition;
use crate::state::AppState;

/// Fire-and-forget collaborator informed after every successful transition.
/// Delivery is never part of the transactional guarantee: failures are logged
/// and the transition stands.
#[async_trait]
pub trait TransitionNotifier: Send + Sync {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()>;
}

/// Used when no webhook endpoint is configured.
pub struct NoopNotifier;

#[async_trait]
impl TransitionNotifier for NoopNotifier {
    async fn notify(&self, _event: &BookingEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Push a transition to the live SSE stream and the outbound webhook.
pub async fn publish(state: &AppState, transition: &Transition) {
    let event = BookingEvent {
        id: transition.event_id,
        event_uid: transition.event_uid.clone(),
        booking_id: transition.booking_id,
        kind: transition.kind,
        actor_id: transition.actor_id,
        refund_eligible: transition.refund_eligible,
        created_at: Utc::now()
            .naive_utc()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    };

    // Nobody listening is fine.
    let _ = state.events_tx.send(event.clone());

    if let Err(e) = state.notifier.notify(&event).await {
        tracing::error!(error = %e, booking_id = event.booking_id, "webhook notification failed");
    }
}
