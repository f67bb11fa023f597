use serde::{Deserialize, Serialize};

use crate::errors::LifecycleError;

/// Which handover a PIN evidences: collection (laundry handed to the washer)
/// or delivery (laundry returned to the user).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    Collection,
    Delivery,
}

impl PinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PinType::Collection => "collection",
            PinType::Delivery => "delivery",
        }
    }
}

/// A submitted PIN must be exactly 4 ASCII digits. Checked before any state
/// is inspected, so a malformed submission never consumes an attempt.
pub fn validate_pin_format(pin: &str) -> Result<(), LifecycleError> {
    if pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(LifecycleError::MalformedPin)
    }
}

/// Generate a 4-digit PIN from UUID entropy, zero-padded.
pub fn generate_pin() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    let n = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) % 10_000;
    format!("{n:04}")
}
