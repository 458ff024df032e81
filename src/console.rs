use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use shutter_sort::ProgressReporter;

/// Terminal progress reporter backed by indicatif spinners.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }

    fn spinner(&self, message: String) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }
}

impl ProgressReporter for CliReporter {
    fn scan_started(&self, root: &Path, is_seed: bool) {
        let label = if is_seed { "seed archive" } else { "source" };
        self.spinner(format!("Scanning {} {}...", label, root.display()));
    }

    fn scan_finished(&self, files: usize, secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Scan complete: {} files in {:.2}s",
            files, secs
        );
    }

    fn catalog_finished(&self, new_records: usize, duplicates: usize, secs: f64) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Catalog updated: {} new, {} duplicate in {:.2}s",
            new_records, duplicates, secs
        );
    }

    fn link_finished(&self, sidecar_links: usize, output_links: usize, secs: f64) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Links: {} sidecars, {} outputs in {:.2}s",
            sidecar_links, output_links, secs
        );
    }

    fn plan_finished(&self, planned: usize, secs: f64) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Destinations planned: {} in {:.2}s",
            planned, secs
        );
    }
}
