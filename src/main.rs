//! Linkhop Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - LINKHOP_HOST: Bind address (default: 0.0.0.0)
//! - LINKHOP_PORT: Port number (default: 8080)
//! - LINKHOP_STORAGE: `file` or `none` (default: file)
//! - LINKHOP_LINKS_FILE: Preferred links file; falls back to ./links,
//!   the user config directory, then /etc/linkhop/links
//! - LINKHOP_WRITE_POLICY: `write-behind` or `write-through` (default: write-behind)
//! - RUST_LOG: Log level (default: info)

use linkhop::api::{run_server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linkhop=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    tracing::info!("Linkhop configuration:");
    tracing::info!("  Listen: {}:{}", config.host, config.port);
    tracing::info!("  Storage: {}", config.registry.storage);
    match &config.registry.links_file {
        Some(path) => tracing::info!("  Requested links file: {}", path.display()),
        None => tracing::info!("  Requested links file: (default locations)"),
    }
    tracing::info!("  Write policy: {}", config.registry.write_policy);

    run_server(config).await
}
