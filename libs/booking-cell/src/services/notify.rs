// libs/booking-cell/src/services/notify.rs
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentEvent, AppointmentEventKind};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Fire-and-forget event fan-out. Booking, reschedule, and cancel each
/// emit exactly one event after their durable write succeeds; a full or
/// closed channel is logged and swallowed so delivery problems never
/// fail the booking itself.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<AppointmentEvent>,
}

impl NotificationDispatcher {
    /// Build a dispatcher and the receiving end the delivery worker
    /// consumes from.
    pub fn channel() -> (Self, mpsc::Receiver<AppointmentEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    pub fn dispatch(&self, kind: AppointmentEventKind, appointment: &Appointment) {
        let event = AppointmentEvent {
            kind: kind.clone(),
            appointment: appointment.clone(),
            emitted_at: Utc::now(),
        };

        match self.tx.try_send(event) {
            Ok(()) => debug!(
                "Dispatched {:?} event for appointment {}",
                kind, appointment.id
            ),
            Err(e) => warn!(
                "Dropped {:?} event for appointment {}: {}",
                kind, appointment.id, e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use chrono::{NaiveDate, NaiveTime};
    use uuid::Uuid;

    fn sample_appointment() -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            practitioner_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 12, 15).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            duration_minutes: 30,
            token: "CLB-2024-1215-4821".to_string(),
            status: AppointmentStatus::Confirmed,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dispatched_event_reaches_the_receiver() {
        let (dispatcher, mut rx) = NotificationDispatcher::channel();
        let appointment = sample_appointment();

        dispatcher.dispatch(AppointmentEventKind::Booked, &appointment);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, AppointmentEventKind::Booked);
        assert_eq!(event.appointment.id, appointment.id);
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_panic_the_dispatcher() {
        let (dispatcher, rx) = NotificationDispatcher::channel();
        drop(rx);

        // try_send fails; the dispatcher logs and moves on
        dispatcher.dispatch(AppointmentEventKind::Cancelled, &sample_appointment());
    }
}
