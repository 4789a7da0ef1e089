// libs/practitioner-cell/src/services/availability.rs
use chrono::{Datelike, NaiveDate};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::ClinicStore;

use crate::models::{PractitionerSchedule, ScheduleError, UnworkableReason};

/// Single-date workability check against the weekly pattern and the
/// exception list. Pure; the store is never consulted here.
pub fn is_workable(
    schedule: &PractitionerSchedule,
    date: NaiveDate,
) -> Result<(), UnworkableReason> {
    let weekday = date.weekday();
    if !schedule.is_working_day(weekday) {
        return Err(UnworkableReason::NotAWorkingDay(weekday));
    }
    if schedule.is_exception(date) {
        return Err(UnworkableReason::ExceptionDate(date));
    }
    Ok(())
}

/// Lazy, finite, restartable sequence of workable dates in the horizon.
/// An empty schedule yields an empty sequence; that is a valid result,
/// not a failure.
pub fn workable_dates(
    schedule: &PractitionerSchedule,
    from: NaiveDate,
    horizon_days: u32,
) -> impl Iterator<Item = NaiveDate> + '_ {
    from.iter_days()
        .take(horizon_days as usize)
        .filter(move |date| is_workable(schedule, *date).is_ok())
}

pub struct AvailabilityService {
    store: ClinicStore,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: ClinicStore::new(config),
        }
    }

    /// Fetch a practitioner's published schedule and validate its
    /// working-hours invariant before handing it to callers.
    pub async fn get_schedule(
        &self,
        practitioner_id: Uuid,
    ) -> Result<PractitionerSchedule, ScheduleError> {
        debug!("Fetching schedule for practitioner {}", practitioner_id);

        let path = format!(
            "/rest/v1/practitioner_schedules?practitioner_id=eq.{}",
            practitioner_id
        );
        let result: Vec<Value> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| ScheduleError::DatabaseError(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Err(ScheduleError::ScheduleNotFound);
        };

        let schedule: PractitionerSchedule = serde_json::from_value(row)
            .map_err(|e| ScheduleError::DatabaseError(format!("Failed to parse schedule: {}", e)))?;

        schedule.validate()?;
        Ok(schedule)
    }

    /// Workable dates over a horizon, collected for the HTTP surface.
    pub async fn workable_dates_for(
        &self,
        practitioner_id: Uuid,
        from: NaiveDate,
        horizon_days: u32,
    ) -> Result<Vec<NaiveDate>, ScheduleError> {
        let schedule = self.get_schedule(practitioner_id).await?;
        let dates: Vec<NaiveDate> = workable_dates(&schedule, from, horizon_days).collect();

        debug!(
            "Practitioner {} has {} workable dates in the next {} days",
            practitioner_id,
            dates.len(),
            horizon_days
        );
        Ok(dates)
    }
}
