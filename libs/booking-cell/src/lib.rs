pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use models::{Appointment, AppointmentEvent, AppointmentStatus, BookingError, SlotKey};
pub use state::BookingState;
