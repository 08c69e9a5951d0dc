//! Image Fetcher: retrieves the bytes behind `imageUrl` and
//! stores them under the upload directory so the rest of the pipeline can
//! treat a remote task the same as a multipart upload.
//!
//! A HEAD preflight tolerates a 405 by falling back to validating during the
//! GET, a `Content-Type` check requires an `image/*` prefix, a
//! `Content-Length` check applies when present, and the streamed GET
//! re-checks size chunk by chunk, deleting the partial file if the limit is
//! exceeded mid-download.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::humanize::ByteSize;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("image unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("image exceeds {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("unsupported content type: {0}")]
    BadFormat(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub max_size: ByteSize,
}

#[derive(Clone)]
pub struct ImageFetcher {
    client: Client,
    config: FetcherConfig,
}

impl ImageFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("xray-fabric/1.0")
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    /// Downloads `url` into `dest_dir/task_id.<ext>` and returns the saved
    /// path. `ext` defaults to `bin` when the content type yields no
    /// recognizable extension.
    pub async fn fetch(&self, url: &str, dest_dir: &Path, task_id: &str) -> Result<PathBuf> {
        info!(url, "starting image download");

        let mut content_type: Option<String> = None;
        match self.client.head(url).send().await {
            Ok(resp) if resp.status() == StatusCode::METHOD_NOT_ALLOWED => {
                warn!(url, "HEAD not supported, deferring validation to GET");
            }
            Ok(resp) => {
                resp.error_for_status_ref()?;
                if let Some(ct) = resp.headers().get(reqwest::header::CONTENT_TYPE) {
                    let ct = ct.to_str().unwrap_or_default().to_string();
                    self.validate_content_type(&ct)?;
                    content_type = Some(ct);
                }
                if let Some(len) = resp.headers().get(reqwest::header::CONTENT_LENGTH) {
                    if let Ok(len) = len.to_str().unwrap_or_default().parse::<u64>() {
                        self.validate_size(len)?;
                    }
                } else {
                    debug!(url, "no Content-Length on HEAD response, skipping precheck");
                }
            }
            Err(err) => return Err(err.into()),
        }

        let response = self.client.get(url).send().await?;
        let response = response.error_for_status()?;

        if content_type.is_none() {
            if let Some(ct) = response.headers().get(reqwest::header::CONTENT_TYPE) {
                let ct = ct.to_str().unwrap_or_default().to_string();
                self.validate_content_type(&ct)?;
                content_type = Some(ct);
            }
        }

        tokio::fs::create_dir_all(dest_dir).await?;
        let ext = extension_for(content_type.as_deref());
        let dest_path = dest_dir.join(format!("{task_id}.{ext}"));

        let mut file = File::create(&dest_path).await?;
        let mut downloaded: u64 = 0;
        let max_bytes = self.config.max_size.as_u64();
        let mut stream = response.bytes_stream();

        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            downloaded += chunk.len() as u64;
            if downloaded > max_bytes {
                drop(file);
                let _ = tokio::fs::remove_file(&dest_path).await;
                return Err(FetchError::TooLarge { limit: max_bytes });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!(url, bytes = downloaded, path = %dest_path.display(), "image downloaded");
        Ok(dest_path)
    }

    fn validate_content_type(&self, content_type: &str) -> Result<()> {
        if !content_type.starts_with("image/") {
            return Err(FetchError::BadFormat(content_type.to_string()));
        }
        Ok(())
    }

    fn validate_size(&self, content_length: u64) -> Result<()> {
        let max_bytes = self.config.max_size.as_u64();
        if content_length > max_bytes {
            return Err(FetchError::TooLarge { limit: max_bytes });
        }
        Ok(())
    }
}

fn extension_for(content_type: Option<&str>) -> &'static str {
    match content_type {
        Some("image/jpeg") => "jpg",
        Some("image/png") => "png",
        Some("image/dicom") => "dcm",
        Some("image/webp") => "webp",
        _ => "bin",
    }
}
