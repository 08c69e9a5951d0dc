use std::env;
use std::path::PathBuf;

use config::{ConfigError, Environment, File};

use super::models::Config;

const CONFIG_ENV_VAR: &str = "XRAY_FABRIC_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/xray-fabric.toml";
const ENV_PREFIX: &str = "XRAY_FABRIC";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. `.env` file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);
    Ok(config)
}

/// Overlay store connection secrets from the environment. This
/// implementation's store is embedded (Fjall, not a networked database),
/// so this only affects the on-disk path when a host override implies a
/// distinct data directory.
fn load_secrets(config: &mut Config) {
    if let Ok(store_path) = env::var("XRAY_FABRIC_STORE_PATH") {
        config.store.path = PathBuf::from(store_path);
    }
}

/// Load configuration from a specific path and environment. Useful for
/// testing with custom config files.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.api.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.worker.concurrency, 4);
    }

    #[test]
    fn load_from_toml_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[api]
bind_addr = "127.0.0.1:9000"

[worker]
concurrency = 8

[image_download]
max_size = "10MB"

[pipelines.panoramic.modules.detector]
weights = "panoramic-v2"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.api.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.worker.concurrency, 8);
        assert_eq!(config.image_download.max_size.as_u64(), 10 * 1024 * 1024);
        assert!(config.pipelines.contains_key("panoramic"));
    }
}
