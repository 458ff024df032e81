use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

/// Chunk size fed to the fingerprint hasher. Large files scale this up so the
/// chunk count stays bounded, see [`crate::identity::chunk_size_for`].
pub const DEFAULT_HASH_CHUNK_BYTES: usize = 8 * 1024 * 1024;

/// Hard ceiling on scan workers regardless of what the config asks for.
pub const MAX_WORKERS: usize = 8;

pub const DEFAULT_WORKERS: usize = 2;

/// Seconds of capture-time slack allowed when matching a RAW to a derived
/// output by filename digits.
pub const LINK_TIME_TOLERANCE_SECS: i64 = 2;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Parallel workers for the fingerprint/metadata phase.
    pub workers: usize,
    /// Compute perceptual fingerprints for rendered images during scan.
    pub use_phash: bool,
    /// Base read-chunk size for content fingerprinting.
    pub hash_chunk_bytes: usize,
    /// Glob patterns excluded from every scan.
    pub ignore_patterns: Vec<String>,
    /// Filename of the catalog database, created under the destination root
    /// unless an explicit path overrides it.
    pub db_filename: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            workers: DEFAULT_WORKERS,
            use_phash: false,
            hash_chunk_bytes: DEFAULT_HASH_CHUNK_BYTES,
            ignore_patterns: vec![
                "**/.Trash*".to_string(),
                "**/@eaDir".to_string(),
                "**/Thumbs.db".to_string(),
                "**/.DS_Store".to_string(),
            ],
            db_filename: "photo_catalog.db".to_string(),
        }
    }
}

impl AppConfig {
    /// Layered load: built-in defaults, then an optional `shutter-sort.toml`
    /// in the working directory, then `SHUTTER_SORT_*` environment variables.
    pub fn load() -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        let builder = Config::builder()
            .set_default("workers", defaults.workers as i64)?
            .set_default("use_phash", defaults.use_phash)?
            .set_default("hash_chunk_bytes", defaults.hash_chunk_bytes as i64)?
            .set_default("ignore_patterns", defaults.ignore_patterns.clone())?
            .set_default("db_filename", defaults.db_filename.clone())?
            .add_source(ConfigFile::with_name("shutter-sort").required(false))
            .add_source(Environment::with_prefix("SHUTTER_SORT"))
            .build()?;

        builder.try_deserialize::<AppConfig>()
    }

    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, MAX_WORKERS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_is_clamped() {
        let mut cfg = AppConfig::default();
        cfg.workers = 0;
        assert_eq!(cfg.effective_workers(), 1);
        cfg.workers = 64;
        assert_eq!(cfg.effective_workers(), MAX_WORKERS);
        cfg.workers = 3;
        assert_eq!(cfg.effective_workers(), 3);
    }

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.workers, DEFAULT_WORKERS);
        assert!(!cfg.use_phash);
        assert!(!cfg.ignore_patterns.is_empty());
    }
}
