//! HTTP query layer over a [`DatasetStore`].
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/beaches` | `{id, name, lat, lon}` for every stored beach |
//! | `GET` | `/api/runs/:id` | Full normalized document for one beach |

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use crate::{
    scenario::BeachInfo,
    store::{BeachRecord, DatasetStore, FileStore, StoreError},
};

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn DatasetStore>,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Beach '{0}' not found.")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "query failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

pub fn build_router(store: Arc<dyn DatasetStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/beaches", get(list_beaches))
        .route("/api/runs/:id", get(get_runs))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { store })
}

/// Runs a blocking store call on the blocking pool.
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, QueryError>
where
    T: Send + 'static,
    F: FnOnce(&dyn DatasetStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = state.store.clone();
    let joined = tokio::task::spawn_blocking(move || f(store.as_ref())).await;
    match joined {
        Ok(result) => Ok(result?),
        Err(err) => Err(QueryError::Internal(err.to_string())),
    }
}

async fn list_beaches(State(state): State<AppState>) -> Result<Json<Vec<BeachInfo>>, QueryError> {
    let beaches = with_store(&state, |store| store.list_beaches()).await?;
    info!(count = beaches.len(), "listed beaches");
    Ok(Json(beaches))
}

async fn get_runs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BeachRecord>, QueryError> {
    let lookup = id.clone();
    let record = with_store(&state, move |store| store.fetch(&lookup)).await?;
    let Some(record) = record else {
        warn!(id = %id, "beach not found");
        return Err(QueryError::NotFound(id));
    };
    info!(
        id = %record.id,
        runs = record.runs.len(),
        "retrieved beach document"
    );
    for (index, run) in record.runs.iter().enumerate() {
        let grains: usize = run.locations.iter().map(|loc| loc.grains.len()).sum();
        debug!(
            run = index + 1,
            operation_id = %run.operation_id,
            locations = run.locations.len(),
            grains,
            "run contents"
        );
    }
    Ok(Json(record))
}

pub struct WebServerConfig {
    pub store_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let store = FileStore::open(&config.store_dir)
        .with_context(|| format!("Failed to open store at {}", config.store_dir.display()))?;
    let router = build_router(Arc::new(store));

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    info!(
        host = %config.host,
        port = config.port,
        store = %config.store_dir.display(),
        "query service listening"
    );
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down query service");
}
