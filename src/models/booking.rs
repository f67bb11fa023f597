use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::ServiceConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub washer_id: Option<i64>,
    pub collection_date: NaiveDateTime,
    pub time_slot: TimeSlot,
    pub services: ServiceConfig,
    pub total_cents: i64,
    pub status: BookingStatus,
    pub collection_pin: String,
    pub delivery_pin: String,
    pub collection_verified_at: Option<NaiveDateTime>,
    pub delivery_verified_at: Option<NaiveDateTime>,
    pub special_instructions: Option<String>,
    pub policy_agreed: bool,
    pub terms_agreed: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    AwaitingAssignment,
    WasherAssigned,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::AwaitingAssignment => "awaiting_assignment",
            BookingStatus::WasherAssigned => "washer_assigned",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// `pending_washer_assignment` is a legacy spelling of the unassigned
    /// state; it is accepted on read but never written back.
    pub fn parse(s: &str) -> Self {
        match s {
            "washer_assigned" => BookingStatus::WasherAssigned,
            "in_progress" => BookingStatus::InProgress,
            "completed" => BookingStatus::Completed,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::AwaitingAssignment,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeSlot {
    Morning,
    Afternoon,
    Evening,
}

impl TimeSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeSlot::Morning => "morning",
            TimeSlot::Afternoon => "afternoon",
            TimeSlot::Evening => "evening",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "morning" => Some(TimeSlot::Morning),
            "afternoon" => Some(TimeSlot::Afternoon),
            "evening" => Some(TimeSlot::Evening),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in [
            BookingStatus::AwaitingAssignment,
            BookingStatus::WasherAssigned,
            BookingStatus::InProgress,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::parse(s.as_str()), s);
        }
    }

    #[test]
    fn test_legacy_unassigned_alias() {
        assert_eq!(
            BookingStatus::parse("pending_washer_assignment"),
            BookingStatus::AwaitingAssignment
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(!BookingStatus::InProgress.is_terminal());
    }
}
