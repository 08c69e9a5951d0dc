use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::observability::Metrics;
use crate::queue::TaskQueue;
use crate::store::TaskStore;

/// Shared Ingress state: the Store and Queue handles are opened once at
/// process start and handed to every request handler as cloneable `Arc`s,
/// never reconstructed per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<TaskStore>,
    pub queue: Arc<TaskQueue>,
    pub metrics: Arc<Metrics>,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<TaskStore>,
        queue: Arc<TaskQueue>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let upload_dir = config.api.upload_dir.clone();
        Self {
            config,
            store,
            queue,
            metrics,
            upload_dir,
        }
    }
}
