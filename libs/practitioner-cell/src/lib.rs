pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

// Re-export the scheduling primitives other cells build on
pub use models::{
    Branch, Practitioner, PractitionerSchedule, ScheduleError, Slot, UnworkableReason,
    WorkingHours,
};
