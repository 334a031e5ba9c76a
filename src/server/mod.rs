//! HTTP API server for rozgar.
//!
//! Exposes worker tracking, radius job search, job CRUD, the messaging
//! webhook, and the live radar feed over SSE.
//!
//! # Example
//!
//! ```bash
//! # Start the server
//! rozgar serve --port 8080
//!
//! # Ping a location (authenticated worker)
//! curl -X POST http://localhost:8080/api/v1/worker/track \
//!   -H "Authorization: Bearer $TOKEN" \
//!   -d '{"latitude": 18.52, "longitude": 73.85}'
//!
//! # View API documentation
//! open "http://localhost:8080/docs"
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::db::Database;
use crate::error::{Result, RozgarError};
use crate::feed::{DEFAULT_FEED_BUFFER, LiveFeed};
use crate::geoindex::{DEFAULT_FRESHNESS, GeoIndex};
use crate::ingest::LocationIngestor;
use crate::notify::MessageSink;
use crate::ratelimit::{RateLimitConfig, RateLimiter};

/// Shared application state.
pub struct AppState {
    /// Path to the jobs/profiles database.
    pub db_path: PathBuf,
    /// Bounds concurrent blocking database operations.
    pub db_semaphore: Semaphore,
    pub max_db_connections: usize,
    pub db_timeout: Duration,
    /// Live worker positions.
    pub geo: Arc<GeoIndex>,
    /// Broadcast hub feeding radar subscribers.
    pub feed: LiveFeed,
    pub limiter: Arc<RateLimiter>,
    pub ingestor: LocationIngestor,
    pub sink: Arc<MessageSink>,
    pub webhook_verify_token: String,
    pub webhook_app_secret: Option<String>,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let feed = LiveFeed::new(config.feed_buffer);
        let geo = Arc::new(GeoIndex::new(config.freshness, feed.sender()));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit));
        let ingestor = LocationIngestor::new(geo.clone(), limiter.clone());
        let sink = Arc::new(MessageSink::from_config(
            config.messaging_url.clone(),
            config.messaging_token.clone(),
        )?);

        Ok(Self {
            db_path: config.db_path.clone(),
            db_semaphore: Semaphore::new(config.db_connections),
            max_db_connections: config.db_connections,
            db_timeout: config.db_timeout,
            geo,
            feed,
            limiter,
            ingestor,
            sink,
            webhook_verify_token: config.webhook_verify_token.clone(),
            webhook_app_secret: config.webhook_app_secret.clone(),
        })
    }
}

/// Server configuration.
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Path to the database.
    pub db_path: PathBuf,
    /// Enable CORS for all origins.
    pub cors: bool,
    /// Specific CORS origins (if cors is true but we want to restrict).
    pub cors_origins: Option<Vec<String>>,
    /// Maximum concurrent blocking database operations.
    pub db_connections: usize,
    /// Timeout for a single database operation.
    pub db_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    /// Location freshness window; older pings count as offline.
    pub freshness: Duration,
    /// Per-subscriber live feed buffer.
    pub feed_buffer: usize,
    /// Shared token for the messaging-provider verification handshake.
    pub webhook_verify_token: String,
    /// App secret for webhook signature verification; unchecked when unset.
    pub webhook_app_secret: Option<String>,
    /// Messaging provider endpoint for outbound replies.
    pub messaging_url: Option<String>,
    /// Messaging provider access token.
    pub messaging_token: Option<String>,
}

impl ServerConfig {
    pub fn new(db_path: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            db_path,
            cors: false,
            cors_origins: None,
            db_connections: 8,
            db_timeout: Duration::from_secs(30),
            rate_limit: RateLimitConfig::default(),
            freshness: DEFAULT_FRESHNESS,
            feed_buffer: DEFAULT_FEED_BUFFER,
            webhook_verify_token: "rozgar-verify-token".to_string(),
            webhook_app_secret: None,
            messaging_url: None,
            messaging_token: None,
        }
    }
}

/// Construct the HTTP router: API under `/api/v1`, the messaging webhook at
/// the root, OpenAPI UI at `/docs`, request tracing and correlation IDs.
pub fn build_router(state: Arc<AppState>, cors: Option<CorsLayer>) -> Router {
    let api_routes = Router::new()
        .route("/worker/track", post(handlers::track_worker))
        .route("/jobs/nearby", get(handlers::nearby_jobs))
        .route("/jobs/heatmap", get(handlers::job_heatmap))
        .route("/jobs", get(handlers::list_jobs).post(handlers::create_job))
        .route(
            "/jobs/{id}",
            get(handlers::get_job)
                .patch(handlers::update_job)
                .delete(handlers::delete_job),
        )
        .route("/workers/live", get(handlers::workers_live))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::get_metrics));

    let mut app = Router::new()
        .route(
            "/webhook/messaging",
            get(handlers::webhook_verify).post(handlers::webhook_receive),
        )
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", openapi::ApiDoc::openapi()))
        .route(
            "/openapi.json",
            get(|| async { axum::Json(openapi::ApiDoc::openapi()) }),
        )
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if let Some(cors_layer) = cors {
        app = app.layer(cors_layer);
    }

    app
}

/// Start and run the HTTP API server.
///
/// Opens (and creates if necessary) the database up front so requests never
/// race schema creation, binds to the configured address, and shuts down
/// gracefully on Ctrl+C.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    Database::open(&config.db_path)?;

    let state = Arc::new(AppState::from_config(&config)?);

    let cors = if config.cors {
        Some(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .max_age(Duration::from_secs(3600)),
        )
    } else if let Some(ref origins) = config.cors_origins {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        if !origins.is_empty() {
            Some(
                CorsLayer::new()
                    .allow_origin(origins)
                    .allow_methods(Any)
                    .allow_headers(Any)
                    .max_age(Duration::from_secs(3600)),
            )
        } else {
            None
        }
    } else {
        None
    };

    let app = build_router(state, cors);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(RozgarError::Io)?;

    eprintln!("Starting rozgar API server on http://{}", addr);
    eprintln!("API documentation: http://{}/docs", addr);
    eprintln!("OpenAPI spec: http://{}/openapi.json", addr);
    eprintln!();
    eprintln!("Press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(RozgarError::Io)?;

    eprintln!("\nServer stopped");

    Ok(())
}

/// Await a CTRL+C (SIGINT) to trigger graceful shutdown.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
}
