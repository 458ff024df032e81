use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::identity::MediaKind;
use crate::metadata::DatetimeSource;

/// Storage format for capture datetimes. Second precision; the grouping key
/// for burst detection truncates to this anyway.
pub const DB_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn datetime_to_db(dt: &NaiveDateTime) -> String {
    dt.format(DB_DATETIME_FORMAT).to_string()
}

pub fn datetime_from_db(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DB_DATETIME_FORMAT).ok()
}

/// A persisted catalog row, one per unique fingerprint.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: i64,
    pub fingerprint: String,
    pub kind: MediaKind,
    pub ext: String,
    pub orig_name: String,
    pub orig_path: String,
    pub dest_path: Option<String>,
    pub size_bytes: i64,
    pub is_seed: bool,
    pub name_score: i32,
    pub first_seen_at: String,
    pub last_seen_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct MediaMetadata {
    pub capture_datetime: Option<NaiveDateTime>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_sec: Option<f64>,
    pub aspect_ratio: Option<f64>,
    pub perceptual_hash: Option<String>,
}

/// Everything the scan phase learns about one file on disk, ready for the
/// single-threaded catalog writer.
#[derive(Debug, Clone)]
pub struct CandidateRecord {
    pub fingerprint: String,
    pub kind: MediaKind,
    pub ext: String,
    pub orig_name: String,
    pub orig_path: PathBuf,
    pub size_bytes: i64,
    pub is_seed: bool,
    pub name_score: i32,
    pub metadata: MediaMetadata,
    pub capture_source: DatetimeSource,
    pub failed_steps: Vec<DatetimeSource>,
}

#[derive(Debug, Clone, Copy)]
pub struct UpsertOutcome {
    pub file_id: i64,
    /// First time this fingerprint was seen.
    pub created: bool,
    /// An existing row's canonical name was replaced by a higher-priority
    /// occurrence.
    pub promoted: bool,
}

/// Unplanned RAW, video, TIFF or PSD row headed for a dated directory.
#[derive(Debug, Clone)]
pub struct PrimaryPlanRow {
    pub fingerprint: String,
    pub kind: MediaKind,
    pub orig_name: String,
    pub orig_path: String,
    pub capture_datetime: Option<NaiveDateTime>,
}

/// Unplanned JPEG row with the fields burst grouping sorts on.
#[derive(Debug, Clone)]
pub struct JpegPlanRow {
    pub id: i64,
    pub fingerprint: String,
    pub orig_name: String,
    pub orig_path: String,
    pub is_seed: bool,
    pub name_score: i32,
    pub capture_datetime: Option<NaiveDateTime>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

/// Sidecar whose linked RAW already has a destination.
#[derive(Debug, Clone)]
pub struct SidecarPlanRow {
    pub fingerprint: String,
    pub orig_name: String,
    pub raw_dest_path: String,
}

/// Row shape shared by both sides of RAW lineage matching.
#[derive(Debug, Clone)]
pub struct LineageRow {
    pub id: i64,
    pub orig_name: String,
    pub capture_datetime: Option<NaiveDateTime>,
    pub perceptual_hash: Option<String>,
}

/// Report row for a RAW with no derived output.
#[derive(Debug, Clone)]
pub struct UnmatchedRaw {
    pub id: i64,
    pub orig_path: String,
    pub dest_path: Option<String>,
    pub capture_datetime: Option<NaiveDateTime>,
    pub camera_model: Option<String>,
}
