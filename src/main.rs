//! Status Board Backend
//!
//! Aggregates human-authored notices and an external monitoring snapshot into
//! one resolved state per service, served as a JSON read API.

mod api;
mod auth;
mod cache;
mod catalog;
mod config;
mod errors;
mod models;
mod notices;
mod resolver;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cache::SystemClock;
use config::Config;
use resolver::StatusResolver;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<StatusResolver>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Status Board Backend");
    tracing::info!("Notices directory: {:?}", config.notices_dir);
    tracing::info!("Monitoring snapshot: {:?}", config.snapshot_path);
    tracing::info!("Service catalog: {:?}", config.catalog_path);
    tracing::info!(
        "Cache TTLs: notices {:?}, services {:?}",
        config.notice_ttl,
        config.service_ttl
    );

    if config.admin_psk.is_none() {
        tracing::warn!("No admin PSK configured (STATUS_ADMIN_PSK). Refresh endpoint is open!");
    }

    let resolver = Arc::new(StatusResolver::from_config(&config, Arc::new(SystemClock)));

    // Warm both caches so the first request does not pay for the load
    let summary = resolver.force_refresh_all().await;
    if !summary.catalog_loaded {
        tracing::warn!("Service catalog unavailable at startup; services will report NA");
    }

    let state = AppState {
        resolver,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.admin_psk.clone();

    let admin_routes = Router::new()
        .route("/refresh", post(api::force_refresh))
        .layer(middleware::from_fn(move |req, next| {
            auth::admin_guard(psk.clone(), req, next)
        }));

    let api_routes = Router::new()
        // Notices
        .route("/notices", get(api::list_notices))
        .route("/notices/{id}", get(api::get_notice))
        // Services
        .route("/services", get(api::list_services))
        .route("/services/{id}", get(api::get_service))
        .route("/services/{id}/notices", get(api::service_notices))
        .route("/status/{id}", get(api::get_status))
        // Layout
        .route("/categories", get(api::list_categories))
        .route("/categories/{id}", get(api::get_category))
        .route("/columns", get(api::list_columns))
        .route("/snapshot", get(api::get_snapshot_info))
        .merge(admin_routes);

    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
