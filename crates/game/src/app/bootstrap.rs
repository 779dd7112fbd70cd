use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use cadence_engine::{ConfigError, InputConfig, LoopConfig};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV_VAR: &str = "CADENCE_CONFIG";
const DEFAULT_WINDOW_TITLE: &str = "Cadence";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameConfig {
    pub(crate) window_title: String,
    #[serde(rename = "loop")]
    pub(crate) loop_config: LoopConfig,
    pub(crate) input: InputConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            window_title: DEFAULT_WINDOW_TITLE.to_string(),
            loop_config: LoopConfig::default(),
            input: InputConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path} at {location}: {source}")]
    ParseConfig {
        path: PathBuf,
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid loop config: {0}")]
    Loop(#[source] ConfigError),
    #[error("invalid input config: {0}")]
    Input(#[source] ConfigError),
}

pub(crate) fn build_app() -> Result<GameConfig, BootstrapError> {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "=== Cadence Startup ===");

    let config = match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) => load_config(Path::new(&path))?,
        None => GameConfig::default(),
    };
    info!(
        fixed_step_ms = config.loop_config.fixed_step_ms,
        max_frame_delta_ms = config.loop_config.max_frame_delta_ms,
        buffer_size = config.input.buffer_size,
        rate_limiting = config.input.enable_rate_limiting,
        "config_loaded"
    );
    Ok(config)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn load_config(path: &Path) -> Result<GameConfig, BootstrapError> {
    let raw = fs::read_to_string(path).map_err(|source| BootstrapError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&raw).map_err(|(location, source)| BootstrapError::ParseConfig {
        path: path.to_path_buf(),
        location,
        source,
    })?;
    config.loop_config.validate().map_err(BootstrapError::Loop)?;
    config.input.validate().map_err(BootstrapError::Input)?;
    info!(path = %path.display(), "config_file_read");
    Ok(config)
}

fn parse_config(raw: &str) -> Result<GameConfig, (String, serde_json::Error)> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, GameConfig>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let location = if path.is_empty() || path == "." {
            "document root".to_string()
        } else {
            path
        };
        (location, error.into_inner())
    })
}
