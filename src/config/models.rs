use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::humanize::ByteSize;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub callback: CallbackConfig,
    #[serde(default)]
    pub image_download: ImageDownloadConfig,
    #[serde(default)]
    pub pipelines: HashMap<String, PipelineConfig>,
}

/// Ingress bind address and admission limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            upload_dir: default_upload_dir(),
            max_payload_bytes: default_max_payload_bytes(),
            request_timeout_sec: default_request_timeout_sec(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("data/uploads")
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(20 * 1024 * 1024)
}

fn default_request_timeout_sec() -> u64 {
    30
}

/// Worker pool sizing. `pool` records a threaded-vs-solo choice driven by
/// the inference runtime not supporting `fork()`; kept as a
/// declared-but-informational knob since this implementation always runs
/// workers as async tasks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_loglevel")]
    pub loglevel: String,
    #[serde(default = "default_pool")]
    pub pool: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            loglevel: default_loglevel(),
            pool: default_pool(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_pool() -> String {
    "threaded".to_string()
}

/// Task Queue location and visibility timeout.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_path")]
    pub path: PathBuf,
    #[serde(default = "default_visibility_timeout_sec")]
    pub visibility_timeout_sec: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: default_queue_path(),
            visibility_timeout_sec: default_visibility_timeout_sec(),
        }
    }
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("data/queue")
}

fn default_visibility_timeout_sec() -> u64 {
    120
}

/// Task Store location and record TTL.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_ttl_sec")]
    pub ttl_sec: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            ttl_sec: default_ttl_sec(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/store")
}

fn default_ttl_sec() -> u64 {
    24 * 3600
}

/// Callback Dispatcher timeout; single-attempt, no retry ladder.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackConfig {
    #[serde(default = "default_callback_timeout_sec")]
    pub timeout_sec: u64,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            timeout_sec: default_callback_timeout_sec(),
        }
    }
}

fn default_callback_timeout_sec() -> u64 {
    10
}

/// Image Fetcher limits: `timeout` / `max_size_mb` / `allowed_extensions`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageDownloadConfig {
    #[serde(default = "default_download_timeout_sec")]
    pub timeout_sec: u64,
    #[serde(default = "default_max_size")]
    pub max_size: ByteSize,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for ImageDownloadConfig {
    fn default() -> Self {
        Self {
            timeout_sec: default_download_timeout_sec(),
            max_size: default_max_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_download_timeout_sec() -> u64 {
    30
}

fn default_max_size() -> ByteSize {
    ByteSize(50 * 1024 * 1024)
}

fn default_allowed_extensions() -> Vec<String> {
    vec![
        ".jpg".into(),
        ".jpeg".into(),
        ".png".into(),
        ".bmp".into(),
        ".dcm".into(),
    ]
}

/// Per-pipeline configuration. `modules` is left opaque — each
/// pipeline interprets its own module settings, so the fabric only needs to
/// carry the JSON through unopened.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub modules: HashMap<String, Value>,
}
