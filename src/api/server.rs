use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    delete_link, get_all, get_all_alfred, get_link, health_check, post_link, redirect,
    replace_all, search, AppState,
};
use crate::registry::{Registry, RegistryConfig, RegistryError};
use crate::storage::StorageError;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the environment
    ///
    /// LINKHOP_HOST=0.0.0.0
    /// LINKHOP_PORT=8080
    /// LINKHOP_STORAGE=file|none
    /// LINKHOP_LINKS_FILE=/srv/linkhop/links
    /// LINKHOP_WRITE_POLICY=write-behind|write-through
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("LINKHOP_HOST").unwrap_or(defaults.host);
        let port = match lookup("LINKHOP_PORT") {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port))?,
            None => defaults.port,
        };

        let storage = match lookup("LINKHOP_STORAGE") {
            Some(kind) => kind.parse()?,
            None => defaults.registry.storage,
        };
        let links_file = lookup("LINKHOP_LINKS_FILE")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let write_policy = match lookup("LINKHOP_WRITE_POLICY") {
            Some(policy) => policy.parse()?,
            None => defaults.registry.write_policy,
        };

        Ok(Self {
            host,
            port,
            registry: RegistryConfig {
                storage,
                links_file,
                write_policy,
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port '{0}'")]
    InvalidPort(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // JSON API
        .route("/api/v1/all", get(get_all).put(replace_all))
        .route("/api/v1/all/alfred", get(get_all_alfred))
        .route("/api/v1/search", get(search))
        .route(
            "/api/v1/links/:path",
            get(get_link).post(post_link).delete(delete_link),
        )
        // Short links
        .route("/:path", get(redirect))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::open(&config.registry).await?;
    let state = Arc::new(AppState { registry });

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting linkhop server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("linkhop server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("Shutdown signal received, stopping server...");
}
