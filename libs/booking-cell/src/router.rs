// libs/booking-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::BookingState;

pub fn booking_routes(state: Arc<BookingState>) -> Router {
    Router::new()
        .route("/sessions", post(handlers::start_session))
        .route("/sessions/{session_id}", get(handlers::get_session))
        .route("/sessions/{session_id}/branch", post(handlers::choose_branch))
        .route(
            "/sessions/{session_id}/practitioner",
            post(handlers::choose_practitioner),
        )
        .route("/sessions/{session_id}/dates", get(handlers::get_session_dates))
        .route("/sessions/{session_id}/slots", get(handlers::get_session_slots))
        .route("/sessions/{session_id}/confirm", post(handlers::confirm_session))
        .route("/sessions/{session_id}/abandon", post(handlers::abandon_session))
        .route("/appointments/{appointment_id}", get(handlers::get_appointment))
        .route(
            "/appointments/{appointment_id}/cancel",
            post(handlers::cancel_appointment),
        )
        .route(
            "/appointments/{appointment_id}/reschedule",
            post(handlers::reschedule_appointment),
        )
        .with_state(state)
}
