// libs/booking-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use practitioner_cell::models::ScheduleError;

// ==============================================================================
// RESERVATION KEY
// ==============================================================================

/// The unit of mutual exclusion: one practitioner, one date, one slot
/// time. At most one uncommitted hold and at most one active
/// appointment may exist per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub practitioner_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.practitioner_id,
            self.date,
            self.time.format("%H:%M")
        )
    }
}

// ==============================================================================
// APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub branch_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: i32,
    /// Human-readable confirmation token, e.g. `CLB-2024-1215-4821`.
    pub token: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            practitioner_id: self.practitioner_id,
            date: self.date,
            time: self.time,
        }
    }

    /// Active appointments block their slot; completed and cancelled
    /// ones do not.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed
        )
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub patient_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChooseBranchRequest {
    pub branch_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoosePractitionerRequest {
    pub practitioner_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmSlotRequest {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
}

// ==============================================================================
// NOTIFICATION EVENTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentEventKind {
    Booked,
    Rescheduled,
    Cancelled,
}

/// Emitted after a successful commit. Delivery of reminders is the
/// receiver's responsibility; the core fires and forgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentEvent {
    pub kind: AppointmentEventKind,
    pub appointment: Appointment,
    pub emitted_at: DateTime<Utc>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Booking session not found")]
    SessionNotFound,

    #[error("Invalid step: {0}")]
    InvalidTransition(String),

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Practitioner does not practice at the selected branch")]
    PractitionerNotAtBranch,

    #[error("Date {date} is unavailable: {reason}")]
    DateNotWorkable { date: NaiveDate, reason: String },

    #[error("{time} is not a bookable slot on {date}")]
    InvalidSlot { date: NaiveDate, time: NaiveTime },

    #[error("The {time} slot on {date} was just taken by another booking")]
    SlotTaken { date: NaiveDate, time: NaiveTime },

    #[error("Appointment cannot change status from {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Reservation is not held by this session")]
    ReservationNotHeld,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}
