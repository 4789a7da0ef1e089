use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use booking_cell::state::BookingState;
use shared_config::AppConfig;

const SWEEP_INTERVAL_SECONDS: u64 = 60;
const SESSION_MAX_AGE_SECONDS: u64 = 3_600;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic booking API server");

    // Load configuration
    let config = AppConfig::from_env();
    let (booking_state, mut events) = BookingState::new(config.clone());

    // Deliver appointment events. A real deployment hands these to the
    // notification collaborator; here they are logged as they drain.
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(
                "Appointment event: {:?} for {} ({})",
                event.kind, event.appointment.id, event.appointment.token
            );
        }
    });

    // Sweep expired slot holds so abandoned sessions release their
    // keys, and drop old sessions so the map does not grow unbounded
    let sweeper = Arc::clone(&booking_state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECONDS));
        loop {
            interval.tick().await;
            sweeper.guard.purge_expired();
            sweeper.sessions.purge_stale(SESSION_MAX_AGE_SECONDS);
        }
    });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(Arc::new(config), booking_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
