use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to load dataset: {0}")]
    Load(#[from] mdrefit::core::io::LoadError),

    #[error(transparent)]
    Engine(#[from] mdrefit::engine::error::EngineError),

    #[error(transparent)]
    Config(#[from] mdrefit::engine::config::ConfigError),

    #[error("Failed to serialize report '{path}': {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: Box<toml::ser::Error>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
