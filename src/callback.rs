//! Callback Dispatcher: POSTs the result envelope to
//! `callbackUrl`. Single-attempt, no retry ladder — a first-version choice,
//! with retries left for a later revision. Only an HTTP 2xx response
//! counts as delivered; anything else, including a timeout or connection
//! failure, is treated as undelivered and left for the caller to decide
//! what to do. The worker loop never retries a callback itself; the
//! visibility-timeout sweep is what causes redelivery of the underlying
//! task.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{error, info};

use crate::domain::CallbackEnvelope;

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("callback request failed: {0}")]
    Request(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, CallbackError>;

#[derive(Clone)]
pub struct CallbackDispatcher {
    client: Client,
}

impl CallbackDispatcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent("xray-fabric/1.0")
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Sends `envelope` to `callback_url`. Returns `true` only on a bare
    /// HTTP 200; `false` for every other outcome, network errors included.
    pub async fn send(&self, callback_url: &str, envelope: &CallbackEnvelope) -> bool {
        info!(callback_url, task_id = %envelope.task_id, "sending callback");

        let result = self
            .client
            .post(callback_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(envelope)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(callback_url, task_id = %envelope.task_id, "callback delivered");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!(
                    callback_url,
                    task_id = %envelope.task_id,
                    %status,
                    body = %body.chars().take(200).collect::<String>(),
                    "callback rejected"
                );
                false
            }
            Err(err) => {
                error!(callback_url, task_id = %envelope.task_id, error = %err, "callback delivery failed");
                false
            }
        }
    }
}
