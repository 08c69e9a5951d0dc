//! Wires the Ingress router and the Worker Pool together inside one OS
//! process: the Task Store and Task Queue are opened once and shared as
//! cloneable handles between the axum router and the worker executor
//! loops, never reopened per request.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::callback::CallbackDispatcher;
use crate::config::Config;
use crate::dispatch::PipelineRegistry;
use crate::fetcher::{FetcherConfig, ImageFetcher};
use crate::observability::Metrics;
use crate::queue::TaskQueue;
use crate::store::TaskStore;
use crate::worker::{WorkerPool, WorkerPoolConfig};

use super::services::{analyze, banner, health};
use super::state::AppState;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Opens the Store and Queue, spawns the Worker Pool, and serves the
/// Ingress router until a shutdown signal arrives.
pub async fn run(config: Config) -> Result<(), AnyError> {
    let config = Arc::new(config);

    info!(path = %config.store.path.display(), "opening task store");
    let store = Arc::new(TaskStore::open(&config.store.path)?);

    info!(path = %config.queue.path.display(), "opening task queue");
    let queue = Arc::new(TaskQueue::open(
        &config.queue.path,
        Duration::from_secs(config.queue.visibility_timeout_sec),
    )?);

    let fetcher = Arc::new(ImageFetcher::new(FetcherConfig {
        timeout: Duration::from_secs(config.image_download.timeout_sec),
        max_size: config.image_download.max_size,
    })?);
    let callback = Arc::new(CallbackDispatcher::new(Duration::from_secs(
        config.callback.timeout_sec,
    ))?);
    let pipelines = Arc::new(PipelineRegistry::default());
    let metrics = Arc::new(Metrics::new());

    let worker_pool = Arc::new(WorkerPool::new(
        store.clone(),
        queue.clone(),
        fetcher,
        callback,
        pipelines,
        metrics.clone(),
        WorkerPoolConfig {
            concurrency: config.worker.concurrency,
            pop_timeout: Duration::from_secs(5),
            reap_interval: Duration::from_secs(60),
            fetch_dir: config.api.upload_dir.join("fetched"),
        },
    ));
    let worker_handles = worker_pool.spawn();

    let state = AppState::new(config.clone(), store, queue, metrics);
    let app = build_router(state, config.api.request_timeout_sec);

    let listener = TcpListener::bind(config.api.bind_addr).await?;
    info!(address = %config.api.bind_addr, "xray-fabric ingress listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for handle in worker_handles {
        handle.abort();
    }

    Ok(())
}

/// Builds the Ingress router without binding a socket, so integration
/// tests can drive it with `tower::ServiceExt::oneshot`.
pub fn build_router(state: AppState, request_timeout_sec: u64) -> Router {
    Router::new()
        .route("/api/v1/analyze", post(analyze))
        .route("/api/v1/health", get(health))
        .route("/health", get(health))
        .route("/", get(banner))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(request_timeout_sec)))
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
