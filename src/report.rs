//! CSV exports for manual review: RAWs with no derived output, and files
//! the classifier could not place.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::catalog::models::datetime_to_db;
use crate::catalog::Catalog;
use crate::error::Error;
use crate::identity::MediaKind;

pub const UNMATCHED_RAWS_FILENAME: &str = "unmatched_raws.csv";
pub const UNCLASSIFIED_FILENAME: &str = "unclassified_files.csv";

fn ensure_parent(path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write every RAW that has no output link. Returns the row count.
pub fn write_unmatched_raws(catalog: &Catalog, out_path: &Path) -> Result<usize, Error> {
    ensure_parent(out_path)?;
    let rows = catalog.fetch_unmatched_raws()?;
    let mut writer = csv::Writer::from_path(out_path)?;
    writer.write_record(["file_id", "orig_path", "dest_path", "capture_datetime", "camera_model"])?;
    for row in &rows {
        writer.write_record([
            row.id.to_string(),
            row.orig_path.clone(),
            row.dest_path.clone().unwrap_or_default(),
            row.capture_datetime
                .as_ref()
                .map(datetime_to_db)
                .unwrap_or_default(),
            row.camera_model.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    info!(rows = rows.len(), path = %out_path.display(), "wrote unmatched RAW report");
    Ok(rows.len())
}

/// Write every unclassified file so junk and surprises get human eyes.
pub fn write_unclassified(catalog: &Catalog, out_path: &Path) -> Result<usize, Error> {
    ensure_parent(out_path)?;
    let rows = catalog.fetch_by_kind(MediaKind::Other)?;
    let mut writer = csv::Writer::from_path(out_path)?;
    writer.write_record(["file_id", "ext", "orig_path", "size_bytes", "is_seed", "last_seen_at"])?;
    for row in &rows {
        writer.write_record([
            row.id.to_string(),
            row.ext.clone(),
            row.orig_path.clone(),
            row.size_bytes.to_string(),
            (row.is_seed as i64).to_string(),
            row.last_seen_at.clone(),
        ])?;
    }
    writer.flush()?;
    info!(rows = rows.len(), path = %out_path.display(), "wrote unclassified report");
    Ok(rows.len())
}
