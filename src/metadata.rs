//! Capture metadata: provider traits for embedded-tag extraction and the
//! datetime fallback chain (embedded tags, path inference, file mtime).

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use tracing::debug;

/// Format of datetime values embedded in image capture tags.
pub const CAPTURE_TAG_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Tag values and camera details pulled from an image file.
#[derive(Debug, Clone, Default)]
pub struct ImageDetails {
    /// Candidate capture-time tags in priority order, as `(name, value)`.
    pub capture_tags: Vec<(String, String)>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct VideoDetails {
    pub capture_datetime: Option<NaiveDateTime>,
    pub duration_sec: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub camera_model: Option<String>,
}

/// Pluggable source of embedded media metadata. The engine never shells out
/// or decodes media itself; a provider is injected at construction.
pub trait ExtractionProvider: Send + Sync {
    fn image_details(&self, path: &Path) -> Option<ImageDetails>;
    fn video_details(&self, path: &Path) -> Option<VideoDetails>;
}

/// Pluggable perceptual fingerprinter for rendered images.
pub trait PerceptualHashProvider: Send + Sync {
    fn fingerprint(&self, path: &Path) -> Option<String>;
}

/// Provider that yields nothing, pushing every file down the fallback chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProvider;

impl ExtractionProvider for NullProvider {
    fn image_details(&self, _path: &Path) -> Option<ImageDetails> {
        None
    }
    fn video_details(&self, _path: &Path) -> Option<VideoDetails> {
        None
    }
}

impl PerceptualHashProvider for NullProvider {
    fn fingerprint(&self, _path: &Path) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatetimeSource {
    EmbeddedTag,
    PathInference,
    FileMtime,
}

impl DatetimeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatetimeSource::EmbeddedTag => "embedded_tag",
            DatetimeSource::PathInference => "path_inference",
            DatetimeSource::FileMtime => "file_mtime",
        }
    }
}

impl fmt::Display for DatetimeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capture datetime plus the provenance trail that produced it.
#[derive(Debug, Clone)]
pub struct ResolvedCapture {
    pub datetime: NaiveDateTime,
    pub source: DatetimeSource,
    /// Steps that were attempted and produced nothing, in order.
    pub failed_steps: Vec<DatetimeSource>,
}

pub fn parse_capture_tag(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), CAPTURE_TAG_FORMAT).ok()
}

/// First parseable tag wins; malformed values are logged and skipped.
pub fn datetime_from_tags(tags: &[(String, String)]) -> Option<NaiveDateTime> {
    for (name, value) in tags {
        match parse_capture_tag(value) {
            Some(dt) => return Some(dt),
            None => debug!(tag = %name, value = %value, "unparseable capture tag"),
        }
    }
    None
}

fn is_plausible_year(n: u32) -> bool {
    (1900..2100).contains(&n)
}

fn parse_year(s: &str) -> Option<u32> {
    if s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit()) {
        let y: u32 = s.parse().ok()?;
        if is_plausible_year(y) {
            return Some(y);
        }
    }
    None
}

/// Strictly two-digit month, 01 through 12.
fn parse_month(s: &str) -> Option<u32> {
    if s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit()) {
        let m: u32 = s.parse().ok()?;
        if (1..=12).contains(&m) {
            return Some(m);
        }
    }
    None
}

fn full_date_at(bytes: &[u8], i: usize) -> Option<NaiveDate> {
    let window = bytes.get(i..i + 10)?;
    if !window.is_ascii() {
        return None;
    }
    let sep = window[4];
    if (sep != b'-' && sep != b'_') || window[7] != sep {
        return None;
    }
    let text = std::str::from_utf8(window).ok()?;
    let year = parse_year(&text[0..4])?;
    if !text[5..7].bytes().all(|b| b.is_ascii_digit())
        || !text[8..10].bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    // Reject when the window sits inside a longer digit run.
    if i > 0 && bytes[i - 1].is_ascii_digit() {
        return None;
    }
    if bytes.get(i + 10).is_some_and(|b| b.is_ascii_digit()) {
        return None;
    }
    let month: u32 = text[5..7].parse().ok()?;
    let day: u32 = text[8..10].parse().ok()?;
    NaiveDate::from_ymd_opt(year as i32, month, day)
}

/// `YYYY-MM-DD` or `YYYY_MM_DD` anywhere in a path component, e.g.
/// `2020-04-01 easter brunch` or `easter 2020_04_01`.
fn parse_full_date(part: &str) -> Option<NaiveDate> {
    let bytes = part.as_bytes();
    (0..bytes.len().saturating_sub(9)).find_map(|i| full_date_at(bytes, i))
}

fn compact_date_at(bytes: &[u8], i: usize) -> Option<NaiveDate> {
    let window = bytes.get(i..i + 8)?;
    if !window.iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if i > 0 && bytes[i - 1].is_ascii_digit() {
        return None;
    }
    if bytes.get(i + 8).is_some_and(|b| b.is_ascii_digit()) {
        return None;
    }
    let text = std::str::from_utf8(window).ok()?;
    let year = parse_year(&text[0..4])?;
    let month: u32 = text[4..6].parse().ok()?;
    let day: u32 = text[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year as i32, month, day)
}

/// Compact `YYYYMMDD` run anywhere in a component, e.g. `20200401_backup`.
fn parse_compact_date(part: &str) -> Option<NaiveDate> {
    let bytes = part.as_bytes();
    (0..bytes.len().saturating_sub(7)).find_map(|i| compact_date_at(bytes, i))
}

/// Infer a capture date from directory and file names along the path.
///
/// Precedence: full date in any component, then a compact date, then a year
/// directory adjacent to a two-digit month directory, then a bare year
/// (mapped to January 1st). Components are scanned root-first.
pub fn infer_datetime_from_path(path: &Path) -> Option<NaiveDateTime> {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(os) => Some(os.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    for part in &parts {
        if let Some(date) = parse_full_date(part) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    for part in &parts {
        if let Some(date) = parse_compact_date(part) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    for (idx, part) in parts.iter().enumerate() {
        let Some(year) = parse_year(part) else { continue };
        let neighbor_month = parts
            .get(idx + 1)
            .and_then(|p| parse_month(p))
            .or_else(|| idx.checked_sub(1).and_then(|i| parse_month(&parts[i])));
        if let Some(month) = neighbor_month {
            return NaiveDate::from_ymd_opt(year as i32, month, 1)?.and_hms_opt(0, 0, 0);
        }
    }
    for part in &parts {
        if let Some(year) = parse_year(part) {
            return NaiveDate::from_ymd_opt(year as i32, 1, 1)?.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Filesystem modification time in local time. Always available, so it is
/// the terminal step of every fallback chain.
pub fn file_mtime_datetime(path: &Path) -> io::Result<NaiveDateTime> {
    let mtime = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Local>::from(mtime).naive_local())
}

/// Resolve an image capture time: embedded tags, then path inference, then
/// mtime.
pub fn resolve_image_capture(
    tags: &[(String, String)],
    path: &Path,
) -> io::Result<ResolvedCapture> {
    let mut failed_steps = Vec::new();
    if let Some(dt) = datetime_from_tags(tags) {
        return Ok(ResolvedCapture {
            datetime: dt,
            source: DatetimeSource::EmbeddedTag,
            failed_steps,
        });
    }
    failed_steps.push(DatetimeSource::EmbeddedTag);

    if let Some(dt) = infer_datetime_from_path(path) {
        return Ok(ResolvedCapture {
            datetime: dt,
            source: DatetimeSource::PathInference,
            failed_steps,
        });
    }
    failed_steps.push(DatetimeSource::PathInference);

    Ok(ResolvedCapture {
        datetime: file_mtime_datetime(path)?,
        source: DatetimeSource::FileMtime,
        failed_steps,
    })
}

/// Videos skip path inference: container timestamps either exist or the
/// mtime is the best evidence available.
pub fn resolve_video_capture(
    provided: Option<NaiveDateTime>,
    path: &Path,
) -> io::Result<ResolvedCapture> {
    if let Some(dt) = provided {
        return Ok(ResolvedCapture {
            datetime: dt,
            source: DatetimeSource::EmbeddedTag,
            failed_steps: Vec::new(),
        });
    }
    Ok(ResolvedCapture {
        datetime: file_mtime_datetime(path)?,
        source: DatetimeSource::FileMtime,
        failed_steps: vec![DatetimeSource::EmbeddedTag],
    })
}

/// Sidecars and unclassified files carry no embedded capture data.
pub fn resolve_plain_capture(path: &Path) -> io::Result<ResolvedCapture> {
    Ok(ResolvedCapture {
        datetime: file_mtime_datetime(path)?,
        source: DatetimeSource::FileMtime,
        failed_steps: Vec::new(),
    })
}

pub fn aspect_ratio(width: Option<u32>, height: Option<u32>) -> Option<f64> {
    match (width, height) {
        (Some(w), Some(h)) if h > 0 => Some(f64::from(w) / f64::from(h)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn tag(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    #[test]
    fn parses_capture_tag_format() {
        let dt = parse_capture_tag("2020:04:01 10:30:00").unwrap();
        assert_eq!(dt.to_string(), "2020-04-01 10:30:00");
        assert!(parse_capture_tag("2020-04-01 10:30:00").is_none());
        assert!(parse_capture_tag("not a date").is_none());
    }

    #[test]
    fn first_parseable_tag_wins() {
        let tags = vec![
            tag("DateTimeOriginal", "garbage"),
            tag("CreateDate", "2019:12:24 18:00:01"),
            tag("ModifyDate", "2021:01:01 00:00:00"),
        ];
        let dt = datetime_from_tags(&tags).unwrap();
        assert_eq!(dt.to_string(), "2019-12-24 18:00:01");
    }

    #[test]
    fn infers_full_date_from_directory() {
        let dt = infer_datetime_from_path(Path::new("/photos/2020-04-01 easter/IMG.jpg")).unwrap();
        assert_eq!(dt.to_string(), "2020-04-01 00:00:00");
        let dt = infer_datetime_from_path(Path::new("/photos/2020_04_01/IMG.jpg")).unwrap();
        assert_eq!(dt.to_string(), "2020-04-01 00:00:00");
    }

    #[test]
    fn infers_compact_date() {
        let dt = infer_datetime_from_path(Path::new("/backup/20200401/shot.cr2")).unwrap();
        assert_eq!(dt.to_string(), "2020-04-01 00:00:00");
        let dt = infer_datetime_from_path(Path::new("/backup/sdcard_20200401/x.cr2")).unwrap();
        assert_eq!(dt.to_string(), "2020-04-01 00:00:00");
    }

    #[test]
    fn date_inside_component_is_found() {
        let dt = infer_datetime_from_path(Path::new("/photos/easter 2020-04-12 brunch/a.jpg"))
            .unwrap();
        assert_eq!(dt.to_string(), "2020-04-12 00:00:00");
    }

    #[test]
    fn digit_runs_longer_than_a_date_are_rejected() {
        // A nine-digit serial is not a compact date.
        assert!(infer_datetime_from_path(Path::new("/x/sn202004015/a.jpg")).is_none());
    }

    #[test]
    fn infers_year_month_directory_pair() {
        let dt = infer_datetime_from_path(Path::new("/archive/2018/03/pic.jpg")).unwrap();
        assert_eq!(dt.to_string(), "2018-03-01 00:00:00");
        // Month before year works too.
        let dt = infer_datetime_from_path(Path::new("/archive/11/2018/pic.jpg")).unwrap();
        assert_eq!(dt.to_string(), "2018-11-01 00:00:00");
    }

    #[test]
    fn bare_year_maps_to_january_first() {
        let dt = infer_datetime_from_path(Path::new("/archive/2015/misc/pic.jpg")).unwrap();
        assert_eq!(dt.to_string(), "2015-01-01 00:00:00");
    }

    #[test]
    fn implausible_years_are_ignored() {
        assert!(infer_datetime_from_path(Path::new("/stuff/3020/pic.jpg")).is_none());
        assert!(infer_datetime_from_path(Path::new("/stuff/1024/pic.jpg")).is_none());
        assert!(infer_datetime_from_path(Path::new("/stuff/misc/pic.jpg")).is_none());
    }

    #[test]
    fn full_date_beats_year_directory() {
        let dt =
            infer_datetime_from_path(Path::new("/archive/2015/2020-04-01/pic.jpg")).unwrap();
        assert_eq!(dt.to_string(), "2020-04-01 00:00:00");
    }

    #[test]
    fn image_chain_prefers_tags_and_records_failures() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("IMG.jpg");
        fs::write(&p, b"x").unwrap();

        let tags = vec![tag("DateTimeOriginal", "2020:04:01 10:30:00")];
        let resolved = resolve_image_capture(&tags, &p).unwrap();
        assert_eq!(resolved.source, DatetimeSource::EmbeddedTag);
        assert!(resolved.failed_steps.is_empty());

        let resolved = resolve_image_capture(&[], &p).unwrap();
        assert_eq!(resolved.source, DatetimeSource::FileMtime);
        assert_eq!(
            resolved.failed_steps,
            vec![DatetimeSource::EmbeddedTag, DatetimeSource::PathInference]
        );
    }

    #[test]
    fn image_chain_falls_through_to_path() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("2020-04-01");
        fs::create_dir_all(&sub).unwrap();
        let p = sub.join("IMG.jpg");
        fs::write(&p, b"x").unwrap();

        let resolved = resolve_image_capture(&[], &p).unwrap();
        assert_eq!(resolved.source, DatetimeSource::PathInference);
        assert_eq!(resolved.failed_steps, vec![DatetimeSource::EmbeddedTag]);
        assert_eq!(resolved.datetime.to_string(), "2020-04-01 00:00:00");
    }

    #[test]
    fn video_chain_skips_path_inference() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("2020-04-01");
        fs::create_dir_all(&sub).unwrap();
        let p = sub.join("clip.mp4");
        fs::write(&p, b"x").unwrap();

        let resolved = resolve_video_capture(None, &p).unwrap();
        assert_eq!(resolved.source, DatetimeSource::FileMtime);
        assert_eq!(resolved.failed_steps, vec![DatetimeSource::EmbeddedTag]);
    }

    #[test]
    fn aspect_ratio_requires_both_dimensions() {
        assert_eq!(aspect_ratio(Some(4000), Some(3000)), Some(4000.0 / 3000.0));
        assert_eq!(aspect_ratio(Some(4000), None), None);
        assert_eq!(aspect_ratio(None, Some(3000)), None);
        assert_eq!(aspect_ratio(Some(1), Some(0)), None);
    }
}
