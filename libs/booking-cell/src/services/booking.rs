// libs/booking-cell/src/services/booking.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use practitioner_cell::services::availability::{self, AvailabilityService};
use practitioner_cell::services::slots;
use shared_config::AppConfig;
use shared_database::ClinicStore;

use crate::models::{Appointment, AppointmentEventKind, AppointmentStatus, BookingError, SlotKey};
use crate::services::lifecycle;
use crate::services::notify::NotificationDispatcher;
use crate::services::reservation::{ReserveOutcome, SlotGuard};

const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Durable-side half of booking: reads and writes appointment rows,
/// runs the cancel and reschedule flows, and keeps the conflict guard
/// in step with what the store says.
pub struct AppointmentBookingService {
    store: ClinicStore,
    config: AppConfig,
    guard: Arc<SlotGuard>,
    notifier: NotificationDispatcher,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig, guard: Arc<SlotGuard>, notifier: NotificationDispatcher) -> Self {
        Self {
            store: ClinicStore::new(config),
            config: config.clone(),
            guard,
            notifier,
        }
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Appointment> = self
            .store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(BookingError::AppointmentNotFound)
    }

    /// Active appointments for one practitioner-day. Completed and
    /// cancelled rows never block a slot, so they are filtered at the
    /// store.
    pub async fn appointments_for_day(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, BookingError> {
        let path = format!(
            "/rest/v1/appointments?practitioner_id=eq.{}&date=eq.{}&status=in.(pending,confirmed)",
            practitioner_id, date
        );
        self.store
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))
    }

    /// Insert a new appointment row, retrying transient store failures
    /// with a linear backoff. The caller already owns the slot claim;
    /// a definitive failure here means the claim must be released.
    pub async fn persist_new_appointment(
        &self,
        appointment: &Appointment,
    ) -> Result<Appointment, BookingError> {
        let body = json!({
            "id": appointment.id,
            "patient_id": appointment.patient_id,
            "practitioner_id": appointment.practitioner_id,
            "branch_id": appointment.branch_id,
            "date": appointment.date,
            "time": appointment.time,
            "duration_minutes": appointment.duration_minutes,
            "token": appointment.token,
            "status": appointment.status,
            "created_at": appointment.created_at,
        });

        let mut last_error = String::new();
        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            match self
                .store
                .insert_returning::<Appointment>("/rest/v1/appointments", body.clone())
                .await
            {
                Ok(mut rows) if !rows.is_empty() => {
                    info!(
                        "Appointment {} persisted on attempt {}",
                        appointment.id, attempt
                    );
                    return Ok(rows.remove(0));
                }
                Ok(_) => {
                    last_error = "Insert returned no representation".to_string();
                    warn!(
                        "Appointment insert attempt {} returned empty result",
                        attempt
                    );
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!("Appointment insert attempt {} failed: {}", attempt, e);
                }
            }

            if attempt < MAX_RETRY_ATTEMPTS {
                tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
            }
        }

        Err(BookingError::DatabaseError(format!(
            "Failed to persist appointment after {} attempts: {}",
            MAX_RETRY_ATTEMPTS, last_error
        )))
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        body: serde_json::Value,
    ) -> Result<Appointment, BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Appointment> = self
            .store
            .update_returning(&path, body)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(BookingError::AppointmentNotFound)
    }

    /// Cancel an active appointment: terminal status in the store,
    /// slot returned to the free pool, one cancellation event out.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get_appointment(appointment_id).await?;
        lifecycle::validate_status_transition(&appointment.status, &AppointmentStatus::Cancelled)?;

        let cancelled = self
            .patch_appointment(appointment_id, json!({ "status": "cancelled" }))
            .await?;

        self.guard.release_committed(&appointment.slot_key());
        info!(
            "Appointment {} cancelled, slot {} freed",
            appointment_id,
            appointment.slot_key()
        );

        self.notifier
            .dispatch(AppointmentEventKind::Cancelled, &cancelled);
        Ok(cancelled)
    }

    /// Move an active appointment to a new slot. The new slot goes
    /// through the same workability, grid, and conflict checks as a
    /// fresh booking; the old slot is freed only after the new one is
    /// durably written.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        new_date: NaiveDate,
        new_time: NaiveTime,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get_appointment(appointment_id).await?;
        if !appointment.is_active() {
            return Err(BookingError::InvalidStatusTransition(appointment.status));
        }

        let schedule = AvailabilityService::new(&self.config)
            .get_schedule(appointment.practitioner_id)
            .await?;

        if let Err(reason) = availability::is_workable(&schedule, new_date) {
            return Err(BookingError::DateNotWorkable {
                date: new_date,
                reason: reason.detail(),
            });
        }
        if !slots::is_valid_slot_time(&schedule, new_date, new_time) {
            return Err(BookingError::InvalidSlot {
                date: new_date,
                time: new_time,
            });
        }

        let new_key = SlotKey {
            practitioner_id: appointment.practitioner_id,
            date: new_date,
            time: new_time,
        };
        let old_key = appointment.slot_key();
        if new_key == old_key {
            debug!("Reschedule of {} targets its own slot", appointment_id);
            return Ok(appointment);
        }

        // Claim the new key first so no concurrent booking can slip in
        // between the store check and the write.
        let claim_id = Uuid::new_v4();
        if self.guard.try_reserve(&new_key, claim_id) == ReserveOutcome::AlreadyReserved {
            return Err(BookingError::SlotTaken {
                date: new_date,
                time: new_time,
            });
        }

        // Rows written by earlier process runs are invisible to the
        // in-process guard; the store is the durable backstop.
        let existing = match self
            .appointments_for_day(appointment.practitioner_id, new_date)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                self.guard.release(&new_key, claim_id);
                return Err(e);
            }
        };
        if existing
            .iter()
            .any(|a| a.id != appointment_id && a.time == new_time)
        {
            self.guard.release(&new_key, claim_id);
            return Err(BookingError::SlotTaken {
                date: new_date,
                time: new_time,
            });
        }

        self.guard.commit(&new_key, claim_id, appointment_id)?;

        let updated = match self
            .patch_appointment(
                appointment_id,
                json!({ "date": new_date, "time": new_time }),
            )
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                self.guard.release_committed(&new_key);
                return Err(e);
            }
        };

        self.guard.release_committed(&old_key);
        info!(
            "Appointment {} rescheduled from {} to {}",
            appointment_id, old_key, new_key
        );

        self.notifier
            .dispatch(AppointmentEventKind::Rescheduled, &updated);
        Ok(updated)
    }
}
