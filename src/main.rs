use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use egfr_core::config::recent_limit_from_env_value;
use egfr_core::{constants, CoreConfig};

/// Main entry point for the eGFR service
///
/// Resolves configuration from the environment once, then serves the REST API with
/// OpenAPI/Swagger documentation.
///
/// # Environment Variables
/// - `EGFR_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `EGFR_DATA_DIR`: Directory for account and result storage (default: "egfr_data")
/// - `EGFR_RECENT_LIMIT`: Results shown on the clinician dashboard (default: 5)
/// - `API_KEY`: when set, required in the `x-api-key` header of every non-health route
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration values are invalid,
/// - the data directory cannot be created,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("egfr=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("EGFR_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let data_dir = std::env::var("EGFR_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(constants::DEFAULT_DATA_DIR));
    std::fs::create_dir_all(&data_dir)?;

    let recent_limit = recent_limit_from_env_value(std::env::var("EGFR_RECENT_LIMIT").ok())?;
    let cfg = Arc::new(CoreConfig::new(data_dir, recent_limit)?);
    let api_key = std::env::var("API_KEY").ok();
    if api_key.is_none() {
        tracing::warn!("API_KEY not set; REST routes are open");
    }

    tracing::info!("++ Starting eGFR REST on {}", rest_addr);
    tracing::info!("++ Data directory {}", cfg.data_dir().display());

    let app = api_rest::router(AppState::new(cfg, api_key));

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
