pub mod assistant; // AI conversation manager (report-grounded chat)
pub mod config;
pub mod core_state; // Transport-agnostic wiring + outward operations
pub mod db;
pub mod diagnosis; // Multi-image aggregation pipeline
pub mod models;
pub mod rooms; // Room identity, message store, broadcast bus

use tracing_subscriber::EnvFilter;

pub use core_state::{CoreError, CoreState};

/// Initialize tracing for embedding processes.
///
/// Honors `RUST_LOG` when set, otherwise falls back to the crate default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Careline core v{}", config::APP_VERSION);
}
