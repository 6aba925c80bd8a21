//! Flood Monitoring API Server
//!
//! REST API for the ESP32 flood sensor: ingests readings, persists them
//! through the configured store, and serves the dashboard.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use data_validator::ReadingNormalizer;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use storage::{MemoryStore, ReadingStore, SheetsStore, StorageError};
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod dashboard;
pub mod error;
pub mod rate_limit;
mod routes;

pub use config::{ServiceConfig, SheetsConfigStatus, StorageBackend};
pub use error::{ApiError, ServerError};

use rate_limit::DefaultGovernorConfig;

/// Application state shared across handlers
pub struct AppState {
    pub normalizer: ReadingNormalizer,
    /// Reading store, `None` when persistence is not configured
    pub store: Option<Arc<dyn ReadingStore>>,
    /// Which Sheets credentials were supplied
    pub sheets_status: SheetsConfigStatus,
    /// Readings served by the list and dashboard endpoints
    pub recent_limit: usize,
    pub version: String,
    pub start_time: Instant,
    /// Prometheus handle, when the recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create new application state
    pub fn new(normalizer: ReadingNormalizer, store: Option<Arc<dyn ReadingStore>>) -> Self {
        Self {
            normalizer,
            store,
            sheets_status: SheetsConfigStatus::default(),
            recent_limit: 100,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Build state from configuration
    ///
    /// Incomplete Sheets credentials leave the server running without a store.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let store: Option<Arc<dyn ReadingStore>> = match config.storage_backend {
            StorageBackend::Memory => Some(Arc::new(MemoryStore::new(config.memory_capacity))),
            StorageBackend::Sheets => match config.sheets_config() {
                Some(sheets) => match SheetsStore::new(sheets) {
                    Ok(store) => Some(Arc::new(store)),
                    Err(e) => {
                        error!("Error initializing Google Sheets store: {}", e);
                        None
                    }
                },
                None => {
                    let status = config.sheets_status();
                    warn!(
                        "Google Sheets not configured (sheet ID: {}, client email: {}, private key: {})",
                        status.has_sheet_id, status.has_client_email, status.has_private_key
                    );
                    None
                }
            },
        };

        let mut state = Self::new(ReadingNormalizer::new(config.normalizer_config()), store);
        state.sheets_status = config.sheets_status();
        state.recent_limit = config.recent_limit;
        state
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self
    }

    /// The configured store, or `NotConfigured`
    pub fn require_store(&self) -> Result<&Arc<dyn ReadingStore>, StorageError> {
        self.store.as_ref().ok_or(StorageError::NotConfigured)
    }
}

/// Health response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub storage: StorageHealth,
}

#[derive(Debug, Serialize)]
pub struct StorageHealth {
    pub backend: Option<&'static str>,
    pub configured: bool,
}

/// Create the application router without rate limiting
pub fn create_router(state: SharedState) -> Router {
    build_router(state, None)
}

/// Create the application router with ingestion throttled per peer IP
pub fn create_router_with_rate_limit(
    state: SharedState,
    governor: Arc<DefaultGovernorConfig>,
) -> Router {
    build_router(state, Some(governor))
}

fn build_router(state: SharedState, governor: Option<Arc<DefaultGovernorConfig>>) -> Router {
    let ingest = match governor {
        Some(config) => post(routes::sensors::submit_reading).layer(GovernorLayer { config }),
        None => post(routes::sensors::submit_reading),
    };
    let sensors = ingest
        .get(routes::sensors::list_readings)
        .delete(routes::sensors::clear_readings);

    Router::new()
        .route("/api/sensors", sensors)
        .route("/api/sensors/latest", get(routes::sensors::latest_reading))
        .route("/api/sheets/init", post(routes::sheets::init_sheet))
        .route("/api/sheets/status", get(routes::sheets::sheet_status))
        .route("/api/dashboard", get(routes::dashboard::get_dashboard))
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let status = if state.store.is_some() { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        storage: StorageHealth {
            backend: state.store.as_ref().map(|s| s.backend()),
            configured: state.store.is_some(),
        },
    })
}

/// Prometheus exposition
async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match state.metrics.as_ref() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

/// Initialize logging
pub fn init_logging(level: &str, json: bool) -> Result<(), ServerError> {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    result.map_err(|e| ServerError::Logging(e.to_string()))
}

/// Run the server
pub async fn run_server(config: ServiceConfig) -> Result<(), ServerError> {
    let addr: SocketAddr = config.bind_addr.parse().map_err(|e: std::net::AddrParseError| {
        ServerError::BindAddr {
            addr: config.bind_addr.clone(),
            reason: e.to_string(),
        }
    })?;

    let mut state = AppState::from_config(&config);
    if config.metrics_enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| ServerError::Metrics(e.to_string()))?;
        state = state.with_metrics(handle);
    }

    let governor = rate_limit::create_governor_config(&config.rate_limit())?;
    let app = create_router_with_rate_limit(Arc::new(state), governor);

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
