// libs/practitioner-cell/src/router.rs
use std::sync::Arc;

use axum::{routing::get, Router};

use shared_config::AppConfig;

use crate::handlers;

pub fn practitioner_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/branches", get(handlers::list_branches))
        .route(
            "/branches/{branch_id}/practitioners",
            get(handlers::list_branch_practitioners),
        )
        .route(
            "/practitioners/{practitioner_id}/workable-dates",
            get(handlers::get_workable_dates),
        )
        .route(
            "/practitioners/{practitioner_id}/slots",
            get(handlers::get_day_slots),
        )
        .with_state(state)
}
