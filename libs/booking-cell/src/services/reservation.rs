// libs/booking-cell/src/services/reservation.rs
//
// Conflict guard for the reservation key space. Every hold and commit
// on a (practitioner, date, time) key goes through here; no other
// component touches reservation state.

use chrono::{DateTime, Duration, Utc};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{BookingError, SlotKey};

/// State of a single key. Free keys are simply absent from the map.
#[derive(Debug, Clone, PartialEq)]
enum Claim {
    /// Exclusive hold taken at the start of a booking attempt. Expires
    /// on its own so an abandoned session cannot block the slot.
    Held {
        session_id: Uuid,
        expires_at: DateTime<Utc>,
    },
    /// A committed booking. Cleared only when the resulting appointment
    /// is cancelled.
    Committed { appointment_id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved,
    AlreadyReserved,
}

pub struct SlotGuard {
    claims: Mutex<HashMap<SlotKey, Claim>>,
    hold_ttl: Duration,
}

impl SlotGuard {
    pub fn new(hold_ttl_seconds: u64) -> Self {
        Self {
            claims: Mutex::new(HashMap::new()),
            hold_ttl: Duration::seconds(hold_ttl_seconds as i64),
        }
    }

    /// Atomic check-and-set on a key. Exactly one of any number of
    /// concurrent callers wins; the rest get `AlreadyReserved` without
    /// blocking. An expired hold counts as free.
    pub fn try_reserve(&self, key: &SlotKey, session_id: Uuid) -> ReserveOutcome {
        let now = Utc::now();
        let mut claims = self.claims.lock().expect("reservation map poisoned");

        match claims.entry(key.clone()) {
            Entry::Occupied(mut entry) => match entry.get() {
                Claim::Held { expires_at, .. } if *expires_at <= now => {
                    entry.insert(Claim::Held {
                        session_id,
                        expires_at: now + self.hold_ttl,
                    });
                    debug!("Expired hold on {} replaced by session {}", key, session_id);
                    ReserveOutcome::Reserved
                }
                _ => {
                    debug!("Reservation race lost on {} by session {}", key, session_id);
                    ReserveOutcome::AlreadyReserved
                }
            },
            Entry::Vacant(entry) => {
                entry.insert(Claim::Held {
                    session_id,
                    expires_at: now + self.hold_ttl,
                });
                debug!("Slot {} held by session {}", key, session_id);
                ReserveOutcome::Reserved
            }
        }
    }

    /// Release an uncommitted hold. Idempotent: releasing a key that is
    /// free, committed, or held by someone else is a no-op.
    pub fn release(&self, key: &SlotKey, session_id: Uuid) {
        let mut claims = self.claims.lock().expect("reservation map poisoned");

        if let Some(Claim::Held {
            session_id: holder, ..
        }) = claims.get(key)
        {
            if *holder == session_id {
                claims.remove(key);
                debug!("Hold on {} released by session {}", key, session_id);
            }
        }
    }

    /// Convert a live hold into a permanent claim. Only the holder may
    /// commit; anything else is an invariant violation on the caller's
    /// side, not a user-facing condition.
    pub fn commit(
        &self,
        key: &SlotKey,
        session_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<(), BookingError> {
        let now = Utc::now();
        let mut claims = self.claims.lock().expect("reservation map poisoned");

        match claims.get(key) {
            Some(Claim::Held {
                session_id: holder,
                expires_at,
            }) if *holder == session_id && *expires_at > now => {
                claims.insert(key.clone(), Claim::Committed { appointment_id });
                info!("Slot {} committed for appointment {}", key, appointment_id);
                Ok(())
            }
            other => {
                warn!(
                    "Commit refused on {} for session {}: claim state {:?}",
                    key, session_id, other
                );
                Err(BookingError::ReservationNotHeld)
            }
        }
    }

    /// Free a committed key after the appointment is cancelled (or its
    /// durable write could not be completed). No-op when the key is not
    /// committed, so keys from earlier process runs are safe to pass.
    pub fn release_committed(&self, key: &SlotKey) {
        let mut claims = self.claims.lock().expect("reservation map poisoned");

        if let Some(Claim::Committed { .. }) = claims.get(key) {
            claims.remove(key);
            info!("Committed slot {} returned to the free pool", key);
        }
    }

    /// Whether the key is currently claimed (live hold or committed).
    /// Used when overlaying reservation state onto generated slots.
    pub fn is_claimed(&self, key: &SlotKey) -> bool {
        let now = Utc::now();
        let claims = self.claims.lock().expect("reservation map poisoned");

        match claims.get(key) {
            Some(Claim::Held { expires_at, .. }) => *expires_at > now,
            Some(Claim::Committed { .. }) => true,
            None => false,
        }
    }

    /// Drop every expired hold. Expiry is equivalent to abandonment;
    /// the periodic sweep just keeps the map from accumulating them.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut claims = self.claims.lock().expect("reservation map poisoned");

        let before = claims.len();
        claims.retain(|_, claim| match claim {
            Claim::Held { expires_at, .. } => *expires_at > now,
            Claim::Committed { .. } => true,
        });
        let purged = before - claims.len();

        if purged > 0 {
            info!("Purged {} expired slot holds", purged);
        }
        purged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{NaiveDate, NaiveTime};
    use std::sync::Arc;

    fn key_at(hour: u32, minute: u32) -> SlotKey {
        SlotKey {
            practitioner_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            time: NaiveTime::from_hms_opt(hour, minute, 0).unwrap(),
        }
    }

    #[test]
    fn reserve_then_commit() {
        let guard = SlotGuard::new(180);
        let key = key_at(9, 0);
        let session = Uuid::new_v4();
        let appointment = Uuid::new_v4();

        assert_eq!(guard.try_reserve(&key, session), ReserveOutcome::Reserved);
        assert!(guard.commit(&key, session, appointment).is_ok());
        assert!(guard.is_claimed(&key));

        // Committed keys stay claimed against new reservations
        assert_eq!(
            guard.try_reserve(&key, Uuid::new_v4()),
            ReserveOutcome::AlreadyReserved
        );
    }

    #[test]
    fn second_caller_is_rejected_immediately() {
        let guard = SlotGuard::new(180);
        let key = key_at(9, 0);

        assert_eq!(
            guard.try_reserve(&key, Uuid::new_v4()),
            ReserveOutcome::Reserved
        );
        assert_eq!(
            guard.try_reserve(&key, Uuid::new_v4()),
            ReserveOutcome::AlreadyReserved
        );

        // The loser can take a different slot on the same day
        assert_eq!(
            guard.try_reserve(&key_at(9, 30), Uuid::new_v4()),
            ReserveOutcome::Reserved
        );
    }

    #[test]
    fn release_returns_key_to_free() {
        let guard = SlotGuard::new(180);
        let key = key_at(10, 0);
        let session = Uuid::new_v4();

        assert_eq!(guard.try_reserve(&key, session), ReserveOutcome::Reserved);
        guard.release(&key, session);
        assert!(!guard.is_claimed(&key));
        assert_eq!(
            guard.try_reserve(&key, Uuid::new_v4()),
            ReserveOutcome::Reserved
        );
    }

    #[test]
    fn release_is_idempotent_and_holder_scoped() {
        let guard = SlotGuard::new(180);
        let key = key_at(10, 0);
        let holder = Uuid::new_v4();

        guard.try_reserve(&key, holder);

        // A stranger releasing the key changes nothing
        guard.release(&key, Uuid::new_v4());
        assert!(guard.is_claimed(&key));

        // Double release by the holder is a no-op
        guard.release(&key, holder);
        guard.release(&key, holder);
        assert!(!guard.is_claimed(&key));
    }

    #[test]
    fn commit_without_hold_is_refused() {
        let guard = SlotGuard::new(180);
        let key = key_at(11, 0);

        assert_matches!(
            guard.commit(&key, Uuid::new_v4(), Uuid::new_v4()),
            Err(BookingError::ReservationNotHeld)
        );

        // Holding session wins, a different session cannot commit
        let holder = Uuid::new_v4();
        guard.try_reserve(&key, holder);
        assert_matches!(
            guard.commit(&key, Uuid::new_v4(), Uuid::new_v4()),
            Err(BookingError::ReservationNotHeld)
        );
    }

    #[test]
    fn expired_hold_is_treated_as_abandoned() {
        // Zero TTL: the hold expires the instant it is taken
        let guard = SlotGuard::new(0);
        let key = key_at(9, 0);
        let first = Uuid::new_v4();

        assert_eq!(guard.try_reserve(&key, first), ReserveOutcome::Reserved);
        assert!(!guard.is_claimed(&key));

        // A later caller reserves the key; the original holder can no
        // longer commit.
        let second = Uuid::new_v4();
        assert_eq!(guard.try_reserve(&key, second), ReserveOutcome::Reserved);
        assert_matches!(
            guard.commit(&key, first, Uuid::new_v4()),
            Err(BookingError::ReservationNotHeld)
        );
    }

    #[test]
    fn purge_drops_only_expired_holds() {
        let expired = SlotGuard::new(0);
        expired.try_reserve(&key_at(9, 0), Uuid::new_v4());
        expired.try_reserve(&key_at(9, 30), Uuid::new_v4());
        assert_eq!(expired.purge_expired(), 2);

        let live = SlotGuard::new(180);
        let session = Uuid::new_v4();
        live.try_reserve(&key_at(9, 0), session);
        live.commit(&key_at(9, 0), session, Uuid::new_v4()).unwrap();
        live.try_reserve(&key_at(9, 30), Uuid::new_v4());
        assert_eq!(live.purge_expired(), 0);
        assert!(live.is_claimed(&key_at(9, 0)));
        assert!(live.is_claimed(&key_at(9, 30)));
    }

    #[test]
    fn cancelling_a_committed_key_frees_it_for_rebooking() {
        let guard = SlotGuard::new(180);
        let key = key_at(14, 0);
        let session = Uuid::new_v4();

        guard.try_reserve(&key, session);
        guard.commit(&key, session, Uuid::new_v4()).unwrap();
        guard.release_committed(&key);

        assert_eq!(
            guard.try_reserve(&key, Uuid::new_v4()),
            ReserveOutcome::Reserved
        );
    }

    #[tokio::test]
    async fn concurrent_reservers_produce_exactly_one_winner() {
        let guard = Arc::new(SlotGuard::new(180));
        let key = key_at(9, 0);

        let mut handles = Vec::new();
        for _ in 0..32 {
            let guard = Arc::clone(&guard);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                guard.try_reserve(&key, Uuid::new_v4())
            }));
        }

        let mut wins = 0;
        let mut losses = 0;
        for handle in handles {
            match handle.await.unwrap() {
                ReserveOutcome::Reserved => wins += 1,
                ReserveOutcome::AlreadyReserved => losses += 1,
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(losses, 31);
    }
}
