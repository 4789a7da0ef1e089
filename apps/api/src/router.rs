use std::sync::Arc;

use axum::{routing::get, Router};

use booking_cell::router::booking_routes;
use booking_cell::state::BookingState;
use practitioner_cell::router::practitioner_routes;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, booking_state: Arc<BookingState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .nest("/directory", practitioner_routes(config))
        .nest("/booking", booking_routes(booking_state))
}
