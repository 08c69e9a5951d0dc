use thiserror::Error;

use super::models::Config;
use crate::domain::TaskType;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("queue.visibility_timeout_sec must be positive")]
    InvalidVisibilityTimeout,

    #[error("store.ttl_sec must be positive")]
    InvalidStoreTtl,

    #[error("image_download.max_size must be positive")]
    InvalidMaxSize,

    #[error("pipelines entry '{0}' does not match a known task type")]
    UnknownPipelineKey(String),
}

/// Validate the entire configuration.
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.queue.visibility_timeout_sec == 0 {
        return Err(ValidationError::InvalidVisibilityTimeout);
    }
    if config.store.ttl_sec == 0 {
        return Err(ValidationError::InvalidStoreTtl);
    }
    if config.image_download.max_size.as_u64() == 0 {
        return Err(ValidationError::InvalidMaxSize);
    }
    for key in config.pipelines.keys() {
        if TaskType::parse(key).is_none() {
            return Err(ValidationError::UnknownPipelineKey(key.clone()));
        }
    }
    Ok(())
}
