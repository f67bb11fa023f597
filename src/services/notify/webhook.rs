use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::TransitionNotifier;
use crate::models::BookingEvent;

/// Delivers transition events to a configured endpoint as signed JSON. The
/// payment processor and view-revalidation layers subscribe here; the
/// `completed` and refund-eligible `cancelled` events are their capture and
/// reversal triggers.
pub struct WebhookNotifier {
    url: String,
    secret: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String, secret: String) -> Self {
        Self {
            url,
            secret,
            client: reqwest::Client::new(),
        }
    }

    fn sign(&self, body: &str) -> anyhow::Result<String> {
        let mut mac = Hmac::<Sha1>::new_from_slice(self.secret.as_bytes())
            .context("invalid webhook secret")?;
        mac.update(body.as_bytes());
        let result = mac.finalize().into_bytes();
        Ok(base64::engine::general_purpose::STANDARD.encode(result))
    }
}

#[async_trait]
impl TransitionNotifier for WebhookNotifier {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()> {
        let body = serde_json::to_string(event).context("failed to serialize event")?;
        let signature = self.sign(&body)?;

        self.client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Washhub-Signature", signature)
            .body(body)
            .send()
            .await
            .context("failed to deliver webhook")?
            .error_for_status()
            .context("webhook endpoint returned error")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_deterministic() {
        let notifier = WebhookNotifier::new("http://localhost/hook".to_string(), "s3cret".to_string());
        let a = notifier.sign(r#"{"booking_id":42}"#).unwrap();
        let b = notifier.sign(r#"{"booking_id":42}"#).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, notifier.sign(r#"{"booking_id":43}"#).unwrap());
    }
}
