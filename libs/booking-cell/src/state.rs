// libs/booking-cell/src/state.rs
use std::sync::Arc;

use tokio::sync::mpsc;

use shared_config::AppConfig;

use crate::models::AppointmentEvent;
use crate::services::booking::AppointmentBookingService;
use crate::services::notify::NotificationDispatcher;
use crate::services::reservation::SlotGuard;
use crate::services::session::BookingSessionService;

/// Shared state for the booking routes. Unlike the read-only directory
/// routes, booking carries process-wide mutable state: the conflict
/// guard and the live sessions.
pub struct BookingState {
    pub config: AppConfig,
    pub guard: Arc<SlotGuard>,
    pub sessions: BookingSessionService,
    notifier: NotificationDispatcher,
}

impl BookingState {
    /// Wire up the guard, the session service, and the notification
    /// channel. The returned receiver feeds the delivery worker.
    pub fn new(config: AppConfig) -> (Arc<Self>, mpsc::Receiver<AppointmentEvent>) {
        let guard = Arc::new(SlotGuard::new(config.reservation_hold_seconds));
        let (notifier, rx) = NotificationDispatcher::channel();
        let sessions =
            BookingSessionService::new(config.clone(), Arc::clone(&guard), notifier.clone());

        let state = Arc::new(Self {
            config,
            guard,
            sessions,
            notifier,
        });
        (state, rx)
    }

    pub fn booking(&self) -> AppointmentBookingService {
        AppointmentBookingService::new(
            &self.config,
            Arc::clone(&self.guard),
            self.notifier.clone(),
        )
    }
}
