use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cache::{shared, CacheConfig, CacheStats, CacheStore};
use crate::connection::{ConnectionConfig, ConnectionInfo, ConnectionManager};
use crate::dispatcher::{FleetSnapshot, UpdateDispatcher};
use crate::trend::{
    LiveSeriesRecorder, SeriesSource, TrendParams, TrendQuery, TrendQueryError, TrendResponse,
    WeekendPeakPolicy,
};

/// Initialize tracing subscriber.
/// Uses RUST_LOG env var for filtering (defaults to info).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(true))
        .with(filter)
        .init();
}

/// JSON-lines variant of [`init_tracing`] for log shippers.
pub fn init_json_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(filter)
        .init();
}

/// The wired monitoring core behind the HTTP routes.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
    pub dispatcher: Arc<UpdateDispatcher>,
    pub recorder: Arc<LiveSeriesRecorder>,
}

impl AppState {
    /// WebSocket live channel with synthetic fallback. Does not connect.
    pub fn from_config(connection: ConnectionConfig, cache: &CacheConfig) -> Self {
        Self::with_manager(ConnectionManager::with_default_sources(connection), cache)
    }

    /// Subscribe a fresh dispatcher and recorder to `manager`.
    pub fn with_manager(manager: ConnectionManager, cache: &CacheConfig) -> Self {
        let dispatcher = Arc::new(UpdateDispatcher::new(shared(CacheStore::<Value>::new(cache))));
        let recorder = Arc::new(LiveSeriesRecorder::default());
        manager.subscribe(dispatcher.clone());
        manager.subscribe(recorder.clone());
        Self {
            manager: Arc::new(manager),
            dispatcher,
            recorder,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/analytics/trends", get(handle_trends))
        .route("/api/connection", get(handle_connection))
        .route("/api/connection/retry", post(handle_retry))
        .route("/api/fleet", get(handle_fleet))
        .route("/api/cache/stats", get(handle_cache_stats))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

fn answer_trends(state: &AppState, params: &TrendParams) -> Result<TrendResponse, TrendQueryError> {
    let query = TrendQuery::from_params(params)?;
    let now = Utc::now();
    match query.source {
        SeriesSource::Generated => {
            query.run_generated(now, &WeekendPeakPolicy::default(), &mut rand::thread_rng())
        }
        SeriesSource::Live => state.recorder.run_query(&query, now),
    }
}

async fn handle_trends(
    State(state): State<AppState>,
    Query(params): Query<TrendParams>,
) -> Result<Json<TrendResponse>, (StatusCode, Json<TrendResponse>)> {
    answer_trends(&state, &params).map(Json).map_err(|e| {
        debug!(error = %e, "rejected trend query");
        (StatusCode::BAD_REQUEST, Json(TrendResponse::failure(&e)))
    })
}

async fn handle_connection(State(state): State<AppState>) -> Json<ConnectionInfo> {
    Json(state.manager.info())
}

async fn handle_retry(State(state): State<AppState>) -> Json<ConnectionInfo> {
    state.manager.retry().await;
    Json(state.manager.info())
}

async fn handle_fleet(State(state): State<AppState>) -> Json<FleetSnapshot> {
    Json(state.dispatcher.snapshot().await)
}

async fn handle_cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.dispatcher.cache().lock().await.stats())
}
