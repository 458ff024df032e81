//! Content-addressed catalog for photo and video archives.
//!
//! The pipeline scans source trees, deduplicates files by content
//! fingerprint, resolves capture metadata, links sidecars and derived
//! outputs to their RAWs, and plans a destination path for every media file
//! under a date-based layout. Nothing is ever moved or written outside the
//! catalog database and report files.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod linker;
pub mod metadata;
pub mod naming;
pub mod planner;
pub mod progress;
pub mod report;
pub mod scanner;

pub use config::AppConfig;
pub use engine::{OrganizeEngine, RunSummary, ScanSource};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
