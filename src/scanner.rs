//! Filesystem scan: a deterministic walk followed by a parallel
//! fingerprint-and-metadata pass.
//!
//! The walk is sequential and sorted so the candidate order (and therefore
//! first-seen-wins behavior in the catalog) is stable across runs. Only the
//! per-file hashing and metadata work fans out across the worker pool.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::Pattern;
use rayon::prelude::*;
use tracing::warn;

use crate::catalog::models::{CandidateRecord, MediaMetadata};
use crate::error::Error;
use crate::identity::{self, MediaKind};
use crate::metadata::{self, ExtractionProvider, PerceptualHashProvider};
use crate::naming;

pub struct ScanOptions {
    pub is_seed: bool,
    pub use_phash: bool,
    pub workers: usize,
    pub hash_chunk_bytes: usize,
    pub skip_dirs: Vec<PathBuf>,
    pub ignore_patterns: Vec<Pattern>,
}

pub struct ScanOutcome {
    /// Candidates in stable walk order.
    pub candidates: Vec<CandidateRecord>,
    /// Files dropped because they could not be read or probed.
    pub skipped: usize,
}

pub fn compile_ignore_patterns(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|p| match Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                warn!(pattern = %p, "invalid ignore pattern: {err}");
                None
            }
        })
        .collect()
}

/// Depth-first walk with entries sorted case-insensitively per directory.
/// Symlinks are not followed.
pub fn collect_files(root: &Path, skip_dirs: &[PathBuf], ignore: &[Pattern]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(current) = stack.pop() {
        if skip_dirs.iter().any(|sd| current.starts_with(sd)) {
            continue;
        }
        if ignore.iter().any(|p| p.matches_path(&current)) {
            continue;
        }
        let reader = match fs::read_dir(&current) {
            Ok(reader) => reader,
            Err(err) => {
                warn!("cannot read {}: {err}", current.display());
                continue;
            }
        };

        let mut entries: Vec<fs::DirEntry> = reader.flatten().collect();
        entries.sort_by_key(|e| e.file_name().to_string_lossy().to_lowercase());

        let mut dirs = Vec::new();
        for entry in entries {
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(_) => continue,
            };
            let path = entry.path();
            if file_type.is_dir() {
                dirs.push(path);
            } else if file_type.is_file() {
                if !ignore.iter().any(|p| p.matches_path(&path)) {
                    out.push(path);
                }
            }
        }
        // Reversed so the stack pops A before Z.
        for dir in dirs.into_iter().rev() {
            stack.push(dir);
        }
    }
    out
}

/// Probe one file: classify, resolve capture time, fingerprint.
pub fn gather_candidate(
    path: &Path,
    is_seed: bool,
    use_phash: bool,
    hash_chunk_bytes: usize,
    extractor: &dyn ExtractionProvider,
    phasher: &dyn PerceptualHashProvider,
) -> Result<CandidateRecord, Error> {
    let kind = identity::classify_path(path);
    let size_bytes = fs::metadata(path)?.len() as i64;

    let mut meta = MediaMetadata::default();
    let resolved = match kind {
        MediaKind::Raw | MediaKind::Jpeg | MediaKind::Psd | MediaKind::Tiff => {
            let details = extractor.image_details(path).unwrap_or_default();
            meta.camera_model = details.camera_model;
            meta.lens_model = details.lens_model;
            meta.width = details.width.map(i64::from);
            meta.height = details.height.map(i64::from);
            meta.aspect_ratio = metadata::aspect_ratio(details.width, details.height);
            if use_phash && matches!(kind, MediaKind::Jpeg | MediaKind::Tiff) {
                meta.perceptual_hash = phasher.fingerprint(path);
            }
            metadata::resolve_image_capture(&details.capture_tags, path)?
        }
        MediaKind::Video => {
            let details = extractor.video_details(path).unwrap_or_default();
            meta.camera_model = details.camera_model;
            meta.width = details.width.map(i64::from);
            meta.height = details.height.map(i64::from);
            meta.aspect_ratio = metadata::aspect_ratio(details.width, details.height);
            meta.duration_sec = details.duration_sec;
            metadata::resolve_video_capture(details.capture_datetime, path)?
        }
        MediaKind::Sidecar | MediaKind::Other => metadata::resolve_plain_capture(path)?,
    };
    meta.capture_datetime = Some(resolved.datetime);

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let orig_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(CandidateRecord {
        fingerprint: identity::fingerprint_file(path, hash_chunk_bytes)?,
        kind,
        ext: identity::normalized_ext(path),
        orig_name,
        orig_path: path.to_path_buf(),
        size_bytes,
        is_seed,
        name_score: naming::descriptiveness_score(&stem),
        metadata: meta,
        capture_source: resolved.source,
        failed_steps: resolved.failed_steps,
    })
}

/// Walk a tree and probe every file on a bounded worker pool. Per-file
/// failures are logged and counted, never fatal; output order matches the
/// walk order.
pub fn scan_tree(
    root: &Path,
    opts: &ScanOptions,
    extractor: Arc<dyn ExtractionProvider>,
    phasher: Arc<dyn PerceptualHashProvider>,
) -> Result<ScanOutcome, Error> {
    let files = collect_files(root, &opts.skip_dirs, &opts.ignore_patterns);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.workers)
        .build()
        .map_err(|e| Error::Other(e.to_string()))?;

    let results: Vec<Option<CandidateRecord>> = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                match gather_candidate(
                    path,
                    opts.is_seed,
                    opts.use_phash,
                    opts.hash_chunk_bytes,
                    extractor.as_ref(),
                    phasher.as_ref(),
                ) {
                    Ok(candidate) => Some(candidate),
                    Err(err) => {
                        warn!("skipping {}: {err}", path.display());
                        None
                    }
                }
            })
            .collect()
    });

    let total = results.len();
    let candidates: Vec<CandidateRecord> = results.into_iter().flatten().collect();
    let skipped = total - candidates.len();
    Ok(ScanOutcome { candidates, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::NullProvider;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path, bytes: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn walk_order_is_stable_and_sorted() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("zeta/late.jpg"), b"1");
        touch(&root.join("alpha/early.jpg"), b"2");
        touch(&root.join("top.jpg"), b"3");

        let files = collect_files(root, &[], &[]);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["top.jpg", "alpha/early.jpg", "zeta/late.jpg"]);

        let again = collect_files(root, &[], &[]);
        assert_eq!(files, again);
    }

    #[test]
    fn skip_dirs_prune_subtrees() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("keep/a.jpg"), b"1");
        touch(&root.join("organized/b.jpg"), b"2");

        let files = collect_files(root, &[root.join("organized")], &[]);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("keep/a.jpg"));
    }

    #[test]
    fn ignore_patterns_filter_files_and_dirs() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("pics/a.jpg"), b"1");
        touch(&root.join("pics/Thumbs.db"), b"2");
        touch(&root.join("@eaDir/thumb.jpg"), b"3");

        let ignore = compile_ignore_patterns(&[
            "**/Thumbs.db".to_string(),
            "**/@eaDir".to_string(),
        ]);
        let files = collect_files(root, &[], &ignore);
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("pics/a.jpg"));
    }

    #[test]
    fn candidate_carries_identity_and_score() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("IMG_0042.CR2");
        touch(&path, b"raw bytes");

        let cand = gather_candidate(
            &path,
            true,
            false,
            crate::config::DEFAULT_HASH_CHUNK_BYTES,
            &NullProvider,
            &NullProvider,
        )
        .unwrap();
        assert_eq!(cand.kind, MediaKind::Raw);
        assert_eq!(cand.ext, ".cr2");
        assert_eq!(cand.orig_name, "IMG_0042.CR2");
        assert!(cand.is_seed);
        assert!(cand.name_score < 0);
        assert_eq!(cand.size_bytes, 9);
        assert!(cand.metadata.capture_datetime.is_some());
    }

    #[test]
    fn scan_preserves_walk_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.jpg"), b"bb");
        touch(&root.join("a.jpg"), b"aa");
        touch(&root.join("c.txt"), b"cc");

        let opts = ScanOptions {
            is_seed: false,
            use_phash: false,
            workers: 4,
            hash_chunk_bytes: crate::config::DEFAULT_HASH_CHUNK_BYTES,
            skip_dirs: vec![],
            ignore_patterns: vec![],
        };
        let outcome =
            scan_tree(root, &opts, Arc::new(NullProvider), Arc::new(NullProvider)).unwrap();
        assert_eq!(outcome.skipped, 0);
        let names: Vec<&str> = outcome
            .candidates
            .iter()
            .map(|c| c.orig_name.as_str())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "c.txt"]);
        assert_eq!(outcome.candidates[2].kind, MediaKind::Other);
    }
}
