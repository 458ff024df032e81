//! Pipeline orchestration: scan, catalog, link, plan.
//!
//! Scans run per source tree with a parallel probe phase; all catalog
//! writes, link passes and planning run single threaded on the one
//! connection. Seed trees should be listed before fresh sources so their
//! occurrences win first-seen ties.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::error::Error;
use crate::linker;
use crate::metadata::{DatetimeSource, ExtractionProvider, NullProvider, PerceptualHashProvider};
use crate::planner::DestinationPlanner;
use crate::progress::ProgressReporter;
use crate::scanner::{self, ScanOptions};

/// One tree to ingest. Seed trees are already-organized archives whose
/// occurrences outrank fresh copies of the same content.
#[derive(Debug, Clone)]
pub struct ScanSource {
    pub root: PathBuf,
    pub is_seed: bool,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub files_processed: usize,
    pub new_records: usize,
    pub duplicates: usize,
    pub promotions: usize,
    pub skipped_files: usize,
    pub path_inferences: usize,
    pub mtime_fallbacks: usize,
    pub sidecar_links: usize,
    pub output_links: usize,
    pub planned_destinations: usize,
    pub ambiguous_groups: usize,
    pub scan_duration: Duration,
    pub link_duration: Duration,
    pub plan_duration: Duration,
}

pub struct OrganizeEngine {
    config: AppConfig,
    db_path: PathBuf,
    extractor: Arc<dyn ExtractionProvider>,
    phasher: Arc<dyn PerceptualHashProvider>,
}

impl OrganizeEngine {
    pub fn new(config: AppConfig, db_path: PathBuf) -> OrganizeEngine {
        OrganizeEngine {
            config,
            db_path,
            extractor: Arc::new(NullProvider),
            phasher: Arc::new(NullProvider),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ExtractionProvider>) -> OrganizeEngine {
        self.extractor = extractor;
        self
    }

    pub fn with_perceptual_hasher(
        mut self,
        phasher: Arc<dyn PerceptualHashProvider>,
    ) -> OrganizeEngine {
        self.phasher = phasher;
        self
    }

    /// Run the full pipeline over the given sources, planning destinations
    /// under `dest_root`. No files are moved.
    pub fn organize(
        &self,
        sources: &[ScanSource],
        dest_root: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunSummary, Error> {
        let catalog = Catalog::open(&self.db_path)?;
        let ignore_patterns = scanner::compile_ignore_patterns(&self.config.ignore_patterns);
        let workers = self.config.effective_workers();
        let mut summary = RunSummary::default();

        for source in sources {
            if !source.root.is_dir() {
                warn!("source is not a directory, skipping: {}", source.root.display());
                continue;
            }
            reporter.scan_started(&source.root, source.is_seed);
            let started = Instant::now();

            let opts = ScanOptions {
                is_seed: source.is_seed,
                use_phash: self.config.use_phash,
                workers,
                hash_chunk_bytes: self.config.hash_chunk_bytes,
                // Never ingest the destination tree while scanning a source.
                skip_dirs: vec![dest_root.to_path_buf()],
                ignore_patterns: ignore_patterns.clone(),
            };
            let outcome = scanner::scan_tree(
                &source.root,
                &opts,
                Arc::clone(&self.extractor),
                Arc::clone(&self.phasher),
            )?;
            let scan_secs = started.elapsed();
            reporter.scan_finished(outcome.candidates.len(), scan_secs.as_secs_f64());

            let write_started = Instant::now();
            let mut new_records = 0;
            let mut duplicates = 0;
            for candidate in &outcome.candidates {
                let upsert = catalog.upsert_file(candidate)?;
                // Metadata tracks the canonical occurrence; a losing
                // duplicate must not clobber it.
                if candidate.kind.is_media() && (upsert.created || upsert.promoted) {
                    catalog.upsert_media_metadata(upsert.file_id, &candidate.metadata)?;
                }
                if upsert.created {
                    new_records += 1;
                } else {
                    duplicates += 1;
                }
                if upsert.promoted {
                    summary.promotions += 1;
                }
                match candidate.capture_source {
                    DatetimeSource::PathInference => summary.path_inferences += 1,
                    DatetimeSource::FileMtime => summary.mtime_fallbacks += 1,
                    DatetimeSource::EmbeddedTag => {}
                }
            }
            reporter.catalog_finished(new_records, duplicates, write_started.elapsed().as_secs_f64());

            summary.files_processed += outcome.candidates.len();
            summary.new_records += new_records;
            summary.duplicates += duplicates;
            summary.skipped_files += outcome.skipped;
            summary.scan_duration += started.elapsed();
            info!(
                root = %source.root.display(),
                seed = source.is_seed,
                files = outcome.candidates.len(),
                new = new_records,
                dup = duplicates,
                "source ingested"
            );
        }

        let link_started = Instant::now();
        summary.sidecar_links = linker::link_sidecars(&catalog)?;
        summary.output_links = linker::link_outputs(&catalog, self.config.use_phash)?;
        summary.link_duration = link_started.elapsed();
        reporter.link_finished(
            summary.sidecar_links,
            summary.output_links,
            summary.link_duration.as_secs_f64(),
        );

        let plan_started = Instant::now();
        let mut planner = DestinationPlanner::new();
        let plan = planner.plan_all(&catalog, dest_root)?;
        summary.planned_destinations = plan.planned;
        summary.ambiguous_groups = plan.ambiguous_groups;
        summary.plan_duration = plan_started.elapsed();
        reporter.plan_finished(plan.planned, summary.plan_duration.as_secs_f64());

        info!(
            processed = summary.files_processed,
            new = summary.new_records,
            dup = summary.duplicates,
            planned = summary.planned_destinations,
            "run complete"
        );
        Ok(summary)
    }
}
