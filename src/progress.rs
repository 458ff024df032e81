//! Progress callbacks. The engine reports phase boundaries through this
//! trait; rendering stays out of the library.

use std::path::Path;

pub trait ProgressReporter: Send + Sync {
    fn scan_started(&self, _root: &Path, _is_seed: bool) {}
    fn scan_finished(&self, _files: usize, _secs: f64) {}
    fn catalog_finished(&self, _new_records: usize, _duplicates: usize, _secs: f64) {}
    fn link_finished(&self, _sidecar_links: usize, _output_links: usize, _secs: f64) {}
    fn plan_finished(&self, _planned: usize, _secs: f64) {}
}

/// Reporter that swallows everything. Default for library callers and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
