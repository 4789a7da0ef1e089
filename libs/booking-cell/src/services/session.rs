// libs/booking-cell/src/services/session.rs
//
// The guided booking flow: branch, practitioner, date and time, then a
// confirmed appointment. Each session is a small state machine; going
// back to an earlier step discards everything chosen after it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use practitioner_cell::models::{Branch, Slot};
use practitioner_cell::services::availability::{self, AvailabilityService};
use practitioner_cell::services::directory::DirectoryService;
use practitioner_cell::services::slots;
use shared_config::AppConfig;

use crate::models::{
    Appointment, AppointmentEventKind, AppointmentStatus, BookingError, SlotKey,
};
use crate::services::booking::AppointmentBookingService;
use crate::services::notify::NotificationDispatcher;
use crate::services::reservation::{ReserveOutcome, SlotGuard};
use crate::services::token;

pub const DEFAULT_APPOINTMENT_MINUTES: i32 = 30;

/// Where a session currently stands. Serialized into the session view
/// with a `step` discriminant so clients can drive their UI off it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SessionState {
    SelectBranch,
    SelectPractitioner {
        branch: Branch,
    },
    SelectDateTime {
        branch: Branch,
        practitioner_id: Uuid,
    },
    Confirmed {
        appointment_id: Uuid,
        token: String,
    },
    Abandoned,
}

impl SessionState {
    fn step_name(&self) -> &'static str {
        match self {
            SessionState::SelectBranch => "select_branch",
            SessionState::SelectPractitioner { .. } => "select_practitioner",
            SessionState::SelectDateTime { .. } => "select_date_time",
            SessionState::Confirmed { .. } => "confirmed",
            SessionState::Abandoned => "abandoned",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Confirmed { .. } | SessionState::Abandoned
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingSession {
    pub id: Uuid,
    pub patient_id: Uuid,
    #[serde(flatten)]
    pub state: SessionState,
    #[serde(skip)]
    held: Option<SlotKey>,
    pub created_at: DateTime<Utc>,
}

/// One session service per process. Sessions live in memory for the
/// duration of the flow; the appointment row is the only durable
/// artifact a session produces.
pub struct BookingSessionService {
    config: AppConfig,
    guard: Arc<SlotGuard>,
    notifier: NotificationDispatcher,
    sessions: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<BookingSession>>>>,
}

impl BookingSessionService {
    pub fn new(config: AppConfig, guard: Arc<SlotGuard>, notifier: NotificationDispatcher) -> Self {
        Self {
            config,
            guard,
            notifier,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn booking(&self) -> AppointmentBookingService {
        AppointmentBookingService::new(&self.config, Arc::clone(&self.guard), self.notifier.clone())
    }

    fn session(&self, session_id: Uuid) -> Result<Arc<tokio::sync::Mutex<BookingSession>>, BookingError> {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .get(&session_id)
            .cloned()
            .ok_or(BookingError::SessionNotFound)
    }

    pub fn start_session(&self, patient_id: Uuid) -> BookingSession {
        let session = BookingSession {
            id: Uuid::new_v4(),
            patient_id,
            state: SessionState::SelectBranch,
            held: None,
            created_at: Utc::now(),
        };

        info!("Booking session {} started for patient {}", session.id, patient_id);
        self.sessions
            .lock()
            .expect("session map poisoned")
            .insert(session.id, Arc::new(tokio::sync::Mutex::new(session.clone())));

        session
    }

    pub async fn get_view(&self, session_id: Uuid) -> Result<BookingSession, BookingError> {
        let session = self.session(session_id)?;
        let session = session.lock().await;
        Ok(session.clone())
    }

    /// Pick (or re-pick) a branch. Allowed from any selection step;
    /// choices made after the branch step are discarded.
    pub async fn choose_branch(
        &self,
        session_id: Uuid,
        branch_id: Uuid,
    ) -> Result<BookingSession, BookingError> {
        let session = self.session(session_id)?;
        let mut session = session.lock().await;

        if session.state.is_terminal() {
            return Err(BookingError::InvalidTransition(format!(
                "cannot choose a branch from the {} step",
                session.state.step_name()
            )));
        }

        let branch = DirectoryService::new(&self.config)
            .get_branch(branch_id)
            .await?;

        self.drop_hold(&mut session);
        debug!("Session {} selected branch {}", session_id, branch.code);
        session.state = SessionState::SelectPractitioner { branch };

        Ok(session.clone())
    }

    /// Pick (or re-pick) a practitioner within the chosen branch.
    pub async fn choose_practitioner(
        &self,
        session_id: Uuid,
        practitioner_id: Uuid,
    ) -> Result<BookingSession, BookingError> {
        let session = self.session(session_id)?;
        let mut session = session.lock().await;

        let branch = match &session.state {
            SessionState::SelectPractitioner { branch }
            | SessionState::SelectDateTime { branch, .. } => branch.clone(),
            other => {
                return Err(BookingError::InvalidTransition(format!(
                    "cannot choose a practitioner from the {} step",
                    other.step_name()
                )))
            }
        };

        let practitioner = DirectoryService::new(&self.config)
            .get_practitioner(practitioner_id)
            .await?;
        if practitioner.branch_id != branch.id || !practitioner.is_active {
            return Err(BookingError::PractitionerNotAtBranch);
        }

        self.drop_hold(&mut session);
        debug!(
            "Session {} selected practitioner {}",
            session_id, practitioner_id
        );
        session.state = SessionState::SelectDateTime {
            branch,
            practitioner_id,
        };

        Ok(session.clone())
    }

    /// Workable dates for the session's practitioner.
    pub async fn workable_dates(
        &self,
        session_id: Uuid,
        from: NaiveDate,
        horizon_days: u32,
    ) -> Result<Vec<NaiveDate>, BookingError> {
        let session = self.session(session_id)?;
        let session = session.lock().await;
        let practitioner_id = self.date_time_step(&session)?;

        let dates = AvailabilityService::new(&self.config)
            .workable_dates_for(practitioner_id, from, horizon_days)
            .await?;
        Ok(dates)
    }

    /// The day's slot grid with reservation state overlaid from both
    /// the conflict guard and the store's active appointments.
    pub async fn day_slots(
        &self,
        session_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, BookingError> {
        let session = self.session(session_id)?;
        let session = session.lock().await;
        let practitioner_id = self.date_time_step(&session)?;

        let schedule = AvailabilityService::new(&self.config)
            .get_schedule(practitioner_id)
            .await?;
        if let Err(reason) = availability::is_workable(&schedule, date) {
            return Err(BookingError::DateNotWorkable {
                date,
                reason: reason.detail(),
            });
        }

        let booked: Vec<NaiveTime> = self
            .booking()
            .appointments_for_day(practitioner_id, date)
            .await?
            .into_iter()
            .map(|a| a.time)
            .collect();

        let mut day = slots::generate_slots(&schedule, date);
        for slot in &mut day {
            let key = SlotKey {
                practitioner_id,
                date,
                time: slot.time,
            };
            slot.is_reserved = booked.contains(&slot.time) || self.guard.is_claimed(&key);
        }

        Ok(day)
    }

    /// Confirm the chosen slot: reserve it, double-check the store,
    /// commit the claim, write the appointment, and emit the booked
    /// event. On a persistence failure the claim is rolled back and
    /// the session stays on the date-time step so the patient can try
    /// again.
    pub async fn confirm(
        &self,
        session_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<BookingSession, BookingError> {
        let session = self.session(session_id)?;
        let mut session = session.lock().await;

        let (branch, practitioner_id) = match &session.state {
            SessionState::SelectDateTime {
                branch,
                practitioner_id,
            } => (branch.clone(), *practitioner_id),
            other => {
                return Err(BookingError::InvalidTransition(format!(
                    "cannot confirm from the {} step",
                    other.step_name()
                )))
            }
        };

        let schedule = AvailabilityService::new(&self.config)
            .get_schedule(practitioner_id)
            .await?;
        if let Err(reason) = availability::is_workable(&schedule, date) {
            return Err(BookingError::DateNotWorkable {
                date,
                reason: reason.detail(),
            });
        }
        if !slots::is_valid_slot_time(&schedule, date, time) {
            return Err(BookingError::InvalidSlot { date, time });
        }

        let key = SlotKey {
            practitioner_id,
            date,
            time,
        };

        // The race is decided here: first session through wins the key.
        if self.guard.try_reserve(&key, session_id) == ReserveOutcome::AlreadyReserved {
            return Err(BookingError::SlotTaken { date, time });
        }
        session.held = Some(key.clone());

        // Appointments persisted before this process started are not in
        // the guard; the store check covers them.
        let booking = self.booking();
        let existing = match booking.appointments_for_day(practitioner_id, date).await {
            Ok(rows) => rows,
            Err(e) => {
                self.drop_hold(&mut session);
                return Err(e);
            }
        };
        if existing.iter().any(|a| a.time == time) {
            self.drop_hold(&mut session);
            return Err(BookingError::SlotTaken { date, time });
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: session.patient_id,
            practitioner_id,
            branch_id: branch.id,
            date,
            time,
            duration_minutes: DEFAULT_APPOINTMENT_MINUTES,
            token: token::confirmation_token(&branch.code, date),
            status: AppointmentStatus::Confirmed,
            created_at: Utc::now(),
        };

        self.guard.commit(&key, session_id, appointment.id)?;
        session.held = None;

        let persisted = match booking.persist_new_appointment(&appointment).await {
            Ok(persisted) => persisted,
            Err(e) => {
                // The slot goes back to the pool and the session stays
                // where it was; nothing durable happened.
                self.guard.release_committed(&key);
                warn!(
                    "Session {} failed to persist appointment for {}: {}",
                    session_id, key, e
                );
                return Err(e);
            }
        };

        info!(
            "Session {} booked appointment {} ({})",
            session_id, persisted.id, persisted.token
        );
        self.notifier
            .dispatch(AppointmentEventKind::Booked, &persisted);

        session.state = SessionState::Confirmed {
            appointment_id: persisted.id,
            token: persisted.token.clone(),
        };
        Ok(session.clone())
    }

    /// Walk away from an unfinished session. Idempotent once abandoned;
    /// a confirmed session cannot be abandoned (cancel the appointment
    /// instead).
    pub async fn abandon(&self, session_id: Uuid) -> Result<BookingSession, BookingError> {
        let session = self.session(session_id)?;
        let mut session = session.lock().await;

        match session.state {
            SessionState::Confirmed { .. } => Err(BookingError::InvalidTransition(
                "a confirmed session cannot be abandoned".to_string(),
            )),
            SessionState::Abandoned => Ok(session.clone()),
            _ => {
                self.drop_hold(&mut session);
                session.state = SessionState::Abandoned;
                info!("Session {} abandoned", session_id);
                Ok(session.clone())
            }
        }
    }

    /// Drop sessions older than `max_age_seconds`, whatever their
    /// state. Finished sessions have served their purpose and an
    /// unfinished one this old is abandoned in all but name (its slot
    /// hold, if any, expired long ago). Sessions mid-request are
    /// skipped and picked up by a later sweep.
    pub fn purge_stale(&self, max_age_seconds: u64) -> usize {
        let now = Utc::now();
        let max_age = Duration::seconds(max_age_seconds as i64);
        let mut sessions = self.sessions.lock().expect("session map poisoned");

        let before = sessions.len();
        sessions.retain(|_, entry| match entry.try_lock() {
            Ok(session) => now.signed_duration_since(session.created_at) < max_age,
            Err(_) => true,
        });
        let purged = before - sessions.len();

        if purged > 0 {
            info!("Purged {} stale booking sessions", purged);
        }
        purged
    }

    fn date_time_step(&self, session: &BookingSession) -> Result<Uuid, BookingError> {
        match &session.state {
            SessionState::SelectDateTime {
                practitioner_id, ..
            } => Ok(*practitioner_id),
            other => Err(BookingError::InvalidTransition(format!(
                "no practitioner selected at the {} step",
                other.step_name()
            ))),
        }
    }

    fn drop_hold(&self, session: &mut BookingSession) {
        if let Some(key) = session.held.take() {
            self.guard.release(&key, session.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> BookingSessionService {
        let (notifier, _rx) = NotificationDispatcher::channel();
        BookingSessionService::new(
            AppConfig::for_store("http://localhost:9"),
            Arc::new(SlotGuard::new(180)),
            notifier,
        )
    }

    #[tokio::test]
    async fn new_session_starts_at_branch_selection() {
        let service = service();
        let session = service.start_session(Uuid::new_v4());

        assert_matches!(session.state, SessionState::SelectBranch);
        let view = service.get_view(session.id).await.unwrap();
        assert_eq!(view.id, session.id);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let service = service();
        assert_matches!(
            service.get_view(Uuid::new_v4()).await,
            Err(BookingError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn confirm_is_rejected_before_a_practitioner_is_chosen() {
        let service = service();
        let session = service.start_session(Uuid::new_v4());

        let result = service
            .confirm(
                session.id,
                NaiveDate::from_ymd_opt(2024, 12, 16).unwrap(),
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            )
            .await;
        assert_matches!(result, Err(BookingError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn abandon_is_idempotent() {
        let service = service();
        let session = service.start_session(Uuid::new_v4());

        let first = service.abandon(session.id).await.unwrap();
        assert_matches!(first.state, SessionState::Abandoned);

        let second = service.abandon(session.id).await.unwrap();
        assert_matches!(second.state, SessionState::Abandoned);
    }

    #[tokio::test]
    async fn stale_sessions_are_purged_by_age() {
        let service = service();
        let session = service.start_session(Uuid::new_v4());

        // A generous age keeps the fresh session around
        assert_eq!(service.purge_stale(3_600), 0);
        assert!(service.get_view(session.id).await.is_ok());

        // Zero age sweeps it
        assert_eq!(service.purge_stale(0), 1);
        assert_matches!(
            service.get_view(session.id).await,
            Err(BookingError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn abandoned_session_rejects_further_steps() {
        let service = service();
        let session = service.start_session(Uuid::new_v4());
        service.abandon(session.id).await.unwrap();

        assert_matches!(
            service.choose_branch(session.id, Uuid::new_v4()).await,
            Err(BookingError::InvalidTransition(_))
        );
    }
}
