use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A destination path is write-once per record; a second assignment is a
    /// contract violation, never silently absorbed.
    #[error("destination already assigned for {fingerprint}: {existing}")]
    DestinationAssigned {
        fingerprint: String,
        existing: PathBuf,
    },

    #[error("{0}")]
    Other(String),
}
