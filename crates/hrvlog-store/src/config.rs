use hrvlog_lib::{HrvError, PipelineConfig};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Invalid(#[from] HrvError),
}

/// Parse and validate a TOML pipeline config. Omitted keys keep their defaults.
pub fn parse_config(text: &str) -> Result<PipelineConfig, ConfigError> {
    let cfg: PipelineConfig = toml::from_str(text)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = parse_config(&contents)?;
    debug!("loaded pipeline config from {}", path.display());
    Ok(cfg)
}
