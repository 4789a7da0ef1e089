use std::env;
use tracing::warn;

/// Default lifetime of an uncommitted slot reservation, in seconds.
/// An abandoned hold must never block a real slot for long.
pub const DEFAULT_RESERVATION_HOLD_SECONDS: u64 = 180;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_url: String,
    pub store_api_key: String,
    pub reservation_hold_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            store_url: env::var("CLINIC_STORE_URL")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_STORE_URL not set, using empty value");
                    String::new()
                }),
            store_api_key: env::var("CLINIC_STORE_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_STORE_API_KEY not set, using empty value");
                    String::new()
                }),
            reservation_hold_seconds: env::var("RESERVATION_HOLD_SECONDS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_RESERVATION_HOLD_SECONDS),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.store_url.is_empty() && !self.store_api_key.is_empty()
    }

    /// Build a config pointing at an arbitrary record store URL.
    /// Integration tests use this to target a mock server.
    pub fn for_store(store_url: &str) -> Self {
        Self {
            store_url: store_url.to_string(),
            store_api_key: "test-api-key".to_string(),
            reservation_hold_seconds: DEFAULT_RESERVATION_HOLD_SECONDS,
        }
    }
}
