//! Relationship passes over the catalog: sidecar-to-RAW pairing and
//! RAW-to-derived-output lineage.

use std::path::{Path, PathBuf};

use ahash::AHashMap;
use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::catalog::models::LineageRow;
use crate::catalog::Catalog;
use crate::config::LINK_TIME_TOLERANCE_SECS;
use crate::error::Error;
use crate::identity::MediaKind;
use crate::naming;

pub const METHOD_PHASH: &str = "phash";
pub const METHOD_STEM_TIME: &str = "stem_time";

pub const CONFIDENCE_PHASH: i64 = 100;
pub const CONFIDENCE_STEM_TIME: i64 = 70;

fn parent_and_stem(path_str: &str) -> Option<(PathBuf, String)> {
    let path = Path::new(path_str);
    let parent = path.parent()?.to_path_buf();
    let stem = path.file_stem()?.to_string_lossy().to_lowercase();
    Some((parent, stem))
}

/// Pair sidecars with the RAW sharing their directory and stem.
///
/// The index keeps the first RAW per `(dir, stem)` key; a sidecar can only
/// ever claim one RAW, and re-running the pass links nothing new.
pub fn link_sidecars(catalog: &Catalog) -> Result<usize, Error> {
    let raws = catalog.fetch_paths_by_kind(MediaKind::Raw)?;
    let mut index: AHashMap<(PathBuf, String), i64> = AHashMap::new();
    for (id, path) in &raws {
        if let Some(key) = parent_and_stem(path) {
            index.entry(key).or_insert(*id);
        }
    }

    let sidecars = catalog.fetch_paths_by_kind(MediaKind::Sidecar)?;
    let mut linked = 0;
    for (sidecar_id, path) in &sidecars {
        let Some(key) = parent_and_stem(path) else { continue };
        if let Some(&raw_id) = index.get(&key) {
            if catalog.insert_sidecar_link(*sidecar_id, raw_id)? {
                linked += 1;
            }
        }
    }
    info!(linked, total_sidecars = sidecars.len(), "sidecar pass complete");
    Ok(linked)
}

fn epoch_secs(dt: &NaiveDateTime) -> i64 {
    dt.and_utc().timestamp()
}

fn time_delta(a: Option<&NaiveDateTime>, b: Option<&NaiveDateTime>) -> i64 {
    match (a, b) {
        (Some(a), Some(b)) => (epoch_secs(a) - epoch_secs(b)).abs(),
        _ => i64::MAX,
    }
}

/// Among candidates, the closest capture time wins; ties break to the lowest
/// id so reruns pick the same winner.
fn pick_closest<'a>(
    candidates: impl Iterator<Item = &'a LineageRow>,
    raw_dt: Option<&NaiveDateTime>,
) -> Option<(&'a LineageRow, i64)> {
    let mut best: Option<(&LineageRow, i64)> = None;
    for cand in candidates {
        let delta = time_delta(raw_dt, cand.capture_datetime.as_ref());
        let better = match best {
            None => true,
            Some((cur, cur_delta)) => delta < cur_delta || (delta == cur_delta && cand.id < cur.id),
        };
        if better {
            best = Some((cand, delta));
        }
    }
    best
}

/// Connect RAWs to the rendered outputs derived from them.
///
/// Two strategies, in confidence order: exact perceptual-fingerprint
/// equality when both sides carry one, then matching filename digit cores
/// with capture times within a small tolerance. One link per RAW; already
/// linked RAWs are left alone.
pub fn link_outputs(catalog: &Catalog, phash_enabled: bool) -> Result<usize, Error> {
    let raws = catalog.fetch_unlinked_raws()?;
    let outputs = catalog.fetch_output_candidates()?;

    let mut phash_index: AHashMap<&str, Vec<&LineageRow>> = AHashMap::new();
    let mut digit_index: AHashMap<String, Vec<&LineageRow>> = AHashMap::new();
    for out in &outputs {
        if let Some(ph) = out.perceptual_hash.as_deref() {
            phash_index.entry(ph).or_default().push(out);
        }
        let stem = Path::new(&out.orig_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| out.orig_name.clone());
        let digits = naming::digit_core(&stem);
        if !digits.is_empty() {
            digit_index.entry(digits).or_default().push(out);
        }
    }

    let mut linked = 0;
    for raw in &raws {
        let raw_dt = raw.capture_datetime.as_ref();

        if phash_enabled {
            if let Some(ph) = raw.perceptual_hash.as_deref() {
                if let Some(matches) = phash_index.get(ph) {
                    if let Some((winner, _)) = pick_closest(matches.iter().copied(), raw_dt) {
                        if catalog.insert_output_link(
                            raw.id,
                            winner.id,
                            METHOD_PHASH,
                            CONFIDENCE_PHASH,
                        )? {
                            debug!(raw = raw.id, output = winner.id, "linked by perceptual hash");
                            linked += 1;
                        }
                        continue;
                    }
                }
            }
        }

        let raw_stem = Path::new(&raw.orig_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| raw.orig_name.clone());
        let digits = naming::digit_core(&raw_stem);
        if digits.is_empty() {
            continue;
        }
        let Some(matches) = digit_index.get(&digits) else { continue };
        let in_window = matches
            .iter()
            .copied()
            .filter(|out| time_delta(raw_dt, out.capture_datetime.as_ref()) <= LINK_TIME_TOLERANCE_SECS);
        if let Some((winner, delta)) = pick_closest(in_window, raw_dt) {
            if catalog.insert_output_link(
                raw.id,
                winner.id,
                METHOD_STEM_TIME,
                CONFIDENCE_STEM_TIME,
            )? {
                debug!(raw = raw.id, output = winner.id, delta, "linked by stem and time");
                linked += 1;
            }
        }
    }
    info!(linked, unmatched = raws.len() - linked, "lineage pass complete");
    Ok(linked)
}
