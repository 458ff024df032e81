//! Destination planning: assigns every catalogued media file a path under
//! the destination root, without moving anything.
//!
//! Layout: RAWs under `raw/{year}/{year}-{month}/`, videos and TIFFs under
//! `output/{year}/{year}-{month}/`, PSDs in a `psd/` subdirectory of the
//! output tree, sidecars next to their linked RAW. JPEGs are grouped into
//! bursts first; the best exemplar of each burst gets the dated directory
//! and the rest land in its `resized/` subdirectory. Unclassified files are
//! never planned.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use chrono::{Local, NaiveDateTime};
use tracing::{debug, info};

use crate::catalog::models::JpegPlanRow;
use crate::catalog::Catalog;
use crate::error::Error;
use crate::identity::MediaKind;
use crate::metadata;
use crate::naming;

#[derive(Debug, Default, Clone, Copy)]
pub struct PlanSummary {
    pub planned: usize,
    /// Burst groups whose exemplar choice tied on every criterion.
    pub ambiguous_groups: usize,
}

pub struct DestinationPlanner {
    used_names: AHashMap<PathBuf, AHashSet<String>>,
}

impl Default for DestinationPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl DestinationPlanner {
    pub fn new() -> DestinationPlanner {
        DestinationPlanner {
            used_names: AHashMap::new(),
        }
    }

    /// Plan everything currently unplanned. Safe to re-run; rows with a
    /// destination are never revisited.
    pub fn plan_all(&mut self, catalog: &Catalog, dest_root: &Path) -> Result<PlanSummary, Error> {
        self.seed_used_names(catalog)?;
        let mut summary = PlanSummary::default();
        let mut ambiguous = 0;
        summary.planned += self.plan_primary(catalog, dest_root)?;
        summary.planned += self.plan_jpegs(catalog, dest_root, &mut ambiguous)?;
        summary.planned += self.plan_sidecars(catalog)?;
        summary.ambiguous_groups = ambiguous;
        info!(
            planned = summary.planned,
            ambiguous = summary.ambiguous_groups,
            "destination planning complete"
        );
        Ok(summary)
    }

    /// Destinations assigned in earlier runs still occupy their filenames.
    fn seed_used_names(&mut self, catalog: &Catalog) -> Result<(), Error> {
        for dest in catalog.fetch_assigned_destinations()? {
            let path = PathBuf::from(&dest);
            if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
                self.used_names
                    .entry(parent.to_path_buf())
                    .or_default()
                    .insert(name.to_string_lossy().into_owned());
            }
        }
        Ok(())
    }

    /// Claim a filename in a directory, appending `_n` before the extension
    /// until it is free.
    fn claim_name(&mut self, dir: &Path, name: &str) -> String {
        let taken = self.used_names.entry(dir.to_path_buf()).or_default();
        if taken.insert(name.to_string()) {
            return name.to_string();
        }
        let (stem, ext) = match name.rfind('.') {
            Some(idx) if idx > 0 => name.split_at(idx),
            _ => (name, ""),
        };
        let mut counter = 1;
        loop {
            let candidate = format!("{stem}_{counter}{ext}");
            if taken.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }

    fn plan_primary(&mut self, catalog: &Catalog, dest_root: &Path) -> Result<usize, Error> {
        let mut planned = 0;
        for row in catalog.fetch_unplanned_primary()? {
            let dt = capture_or_mtime(row.capture_datetime, &row.orig_path);
            let dir = dest_root.join(kind_subdir(row.kind, &dt));
            let name = self.claim_name(&dir, &row.orig_name);
            catalog.set_destination(&row.fingerprint, &dir.join(name))?;
            planned += 1;
        }
        Ok(planned)
    }

    fn plan_jpegs(
        &mut self,
        catalog: &Catalog,
        dest_root: &Path,
        ambiguous: &mut usize,
    ) -> Result<usize, Error> {
        // BTreeMap keeps group iteration order stable, so collision counters
        // come out the same on every run over the same catalog.
        let mut groups: BTreeMap<(String, i64), Vec<JpegPlanRow>> = BTreeMap::new();
        for row in catalog.fetch_unplanned_jpegs()? {
            let stem = Path::new(&row.orig_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| row.orig_name.clone());
            let ts = row
                .capture_datetime
                .map(|dt| dt.and_utc().timestamp())
                .unwrap_or(i64::MIN);
            groups
                .entry((naming::normalize_stem(&stem), ts))
                .or_default()
                .push(row);
        }

        let mut planned = 0;
        for ((norm_stem, _), mut members) in groups {
            members.sort_by(|a, b| {
                b.is_seed
                    .cmp(&a.is_seed)
                    .then_with(|| b.name_score.cmp(&a.name_score))
                    .then_with(|| pixel_area(b).cmp(&pixel_area(a)))
                    .then_with(|| a.id.cmp(&b.id))
            });
            if members.len() > 1 {
                let (a, b) = (&members[0], &members[1]);
                if a.is_seed == b.is_seed
                    && a.name_score == b.name_score
                    && pixel_area(a) == pixel_area(b)
                {
                    debug!(stem = %norm_stem, "burst exemplar tie, falling back to first seen");
                    *ambiguous += 1;
                }
            }

            for (rank, row) in members.iter().enumerate() {
                let dt = capture_or_mtime(row.capture_datetime, &row.orig_path);
                let mut dir = dest_root.join(kind_subdir(MediaKind::Jpeg, &dt));
                if rank > 0 {
                    dir = dir.join("resized");
                }
                let name = self.claim_name(&dir, &row.orig_name);
                catalog.set_destination(&row.fingerprint, &dir.join(name))?;
                planned += 1;
            }
        }
        Ok(planned)
    }

    /// A sidecar follows its RAW into the same directory, keeping its own
    /// filename. Sidecars without a linked-and-planned RAW stay unplanned.
    fn plan_sidecars(&mut self, catalog: &Catalog) -> Result<usize, Error> {
        let mut planned = 0;
        for row in catalog.fetch_unplanned_sidecars()? {
            let Some(dir) = Path::new(&row.raw_dest_path).parent().map(Path::to_path_buf) else {
                continue;
            };
            let name = self.claim_name(&dir, &row.orig_name);
            catalog.set_destination(&row.fingerprint, &dir.join(name))?;
            planned += 1;
        }
        Ok(planned)
    }
}

fn pixel_area(row: &JpegPlanRow) -> i64 {
    match (row.width, row.height) {
        (Some(w), Some(h)) => w * h,
        _ => 0,
    }
}

/// Dated subdirectory for a kind, relative to the destination root.
fn kind_subdir(kind: MediaKind, dt: &NaiveDateTime) -> PathBuf {
    use chrono::Datelike;
    let folder = format!("{0}/{0}-{1:02}", dt.year(), dt.month());
    match kind {
        MediaKind::Raw => PathBuf::from("raw").join(folder),
        MediaKind::Psd => PathBuf::from("output").join(folder).join("psd"),
        _ => PathBuf::from("output").join(folder),
    }
}

/// Planning never fails on a missing timestamp; the file's mtime stands in,
/// and if even that is unreadable the current time does.
fn capture_or_mtime(capture: Option<NaiveDateTime>, orig_path: &str) -> NaiveDateTime {
    capture.unwrap_or_else(|| {
        metadata::file_mtime_datetime(Path::new(orig_path))
            .unwrap_or_else(|_| Local::now().naive_local())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    #[test]
    fn kind_subdirs_follow_layout() {
        let t = dt(2020, 4, 1);
        assert_eq!(kind_subdir(MediaKind::Raw, &t), PathBuf::from("raw/2020/2020-04"));
        assert_eq!(
            kind_subdir(MediaKind::Video, &t),
            PathBuf::from("output/2020/2020-04")
        );
        assert_eq!(
            kind_subdir(MediaKind::Tiff, &t),
            PathBuf::from("output/2020/2020-04")
        );
        assert_eq!(
            kind_subdir(MediaKind::Psd, &t),
            PathBuf::from("output/2020/2020-04/psd")
        );
        assert_eq!(
            kind_subdir(MediaKind::Jpeg, &t),
            PathBuf::from("output/2020/2020-04")
        );
    }

    #[test]
    fn claim_name_appends_counter_on_collision() {
        let mut planner = DestinationPlanner::new();
        let dir = Path::new("/dest/raw/2020/2020-04");
        assert_eq!(planner.claim_name(dir, "IMG_0001.cr2"), "IMG_0001.cr2");
        assert_eq!(planner.claim_name(dir, "IMG_0001.cr2"), "IMG_0001_1.cr2");
        assert_eq!(planner.claim_name(dir, "IMG_0001.cr2"), "IMG_0001_2.cr2");
        // Different directory, fresh namespace.
        let other = Path::new("/dest/raw/2020/2020-05");
        assert_eq!(planner.claim_name(other, "IMG_0001.cr2"), "IMG_0001.cr2");
    }

    #[test]
    fn claim_name_handles_extensionless_and_dotfiles() {
        let mut planner = DestinationPlanner::new();
        let dir = Path::new("/d");
        assert_eq!(planner.claim_name(dir, "README"), "README");
        assert_eq!(planner.claim_name(dir, "README"), "README_1");
        assert_eq!(planner.claim_name(dir, ".hidden"), ".hidden");
        assert_eq!(planner.claim_name(dir, ".hidden"), ".hidden_1");
    }
}
