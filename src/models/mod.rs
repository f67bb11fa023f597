pub mod booking;
pub mod event;
pub mod services;

pub use booking::{Booking, BookingStatus, TimeSlot};
pub use event::{BookingEvent, TransitionKind};
pub use services::{LineItem, ServiceConfig};
