// libs/practitioner-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// DIRECTORY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: Uuid,
    /// Short uppercase code used as the token prefix, e.g. "CLB".
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Practitioner {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub full_name: String,
    pub specialty: Option<String>,
    pub is_active: bool,
}

// ==============================================================================
// SCHEDULE MODELS
// ==============================================================================

/// Daily working window, inclusive start / exclusive end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// A practitioner's weekly pattern plus date-specific exceptions.
/// A date is workable iff its weekday is in `working_days` and the date
/// is not in `exception_dates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PractitionerSchedule {
    pub practitioner_id: Uuid,
    pub working_days: Vec<Weekday>,
    pub working_hours: WorkingHours,
    #[serde(default)]
    pub exception_dates: Vec<NaiveDate>,
}

impl PractitionerSchedule {
    /// Invariant check applied when a schedule is loaded from the store.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.working_hours.start >= self.working_hours.end {
            return Err(ScheduleError::InvalidWorkingHours {
                start: self.working_hours.start,
                end: self.working_hours.end,
            });
        }
        Ok(())
    }

    pub fn is_working_day(&self, weekday: Weekday) -> bool {
        self.working_days.contains(&weekday)
    }

    pub fn is_exception(&self, date: NaiveDate) -> bool {
        self.exception_dates.contains(&date)
    }
}

// ==============================================================================
// SLOT MODEL
// ==============================================================================

/// A bookable time window on a workable date. Slots are derived on
/// demand from the schedule; they are never persisted on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub time: NaiveTime,
    pub is_peak: bool,
    pub is_reserved: bool,
}

// ==============================================================================
// AVAILABILITY OUTCOME
// ==============================================================================

/// Why a date is not workable. The `Display` strings are user-facing
/// and drive the booking flow's messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnworkableReason {
    NotAWorkingDay(Weekday),
    ExceptionDate(NaiveDate),
}

impl fmt::Display for UnworkableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnworkableReason::NotAWorkingDay(_) => write!(f, "not a working day"),
            UnworkableReason::ExceptionDate(_) => {
                write!(f, "practitioner unavailable on this date")
            }
        }
    }
}

impl UnworkableReason {
    /// Expanded message naming the offending weekday or date.
    pub fn detail(&self) -> String {
        match self {
            UnworkableReason::NotAWorkingDay(weekday) => {
                format!("not a working day ({})", weekday)
            }
            UnworkableReason::ExceptionDate(date) => {
                format!("practitioner unavailable on {}", date)
            }
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScheduleError {
    #[error("Branch not found")]
    BranchNotFound,

    #[error("Practitioner not found")]
    PractitionerNotFound,

    #[error("No schedule published for practitioner")]
    ScheduleNotFound,

    #[error("Invalid working hours: start {start} is not before end {end}")]
    InvalidWorkingHours { start: NaiveTime, end: NaiveTime },

    #[error("Database error: {0}")]
    DatabaseError(String),
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkableDatesResponse {
    pub practitioner_id: Uuid,
    pub from: NaiveDate,
    pub horizon_days: u32,
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySlotsResponse {
    pub practitioner_id: Uuid,
    pub date: NaiveDate,
    pub workable: bool,
    pub reason: Option<String>,
    pub slots: Vec<Slot>,
}
