//! File identity: media classification from extension and content
//! fingerprinting with blake3.
//!
//! The fingerprint is the dedup key for the whole catalog. Two files with the
//! same bytes get the same fingerprint no matter where they live or what they
//! are called.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const RAW_EXTS: &[&str] = &["cr2", "cr3", "nef", "arw", "orf", "rw2", "dng"];
const JPEG_EXTS: &[&str] = &["jpg", "jpeg", "jpe", "gif", "png"];
const VIDEO_EXTS: &[&str] = &[
    "mp4", "mov", "m4v", "avi", "mts", "m2ts", "3gp", "mpg", "mpeg", "tod",
];
const PSD_EXTS: &[&str] = &["psd", "psb", "pspimage"];
const TIFF_EXTS: &[&str] = &["tif", "tiff"];
const SIDECAR_EXTS: &[&str] = &["xmp", "vrd", "dop", "dpp", "pp3"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Raw,
    Jpeg,
    Video,
    Psd,
    Tiff,
    Sidecar,
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Raw => "raw",
            MediaKind::Jpeg => "jpeg",
            MediaKind::Video => "video",
            MediaKind::Psd => "psd",
            MediaKind::Tiff => "tiff",
            MediaKind::Sidecar => "sidecar",
            MediaKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> MediaKind {
        match s {
            "raw" => MediaKind::Raw,
            "jpeg" => MediaKind::Jpeg,
            "video" => MediaKind::Video,
            "psd" => MediaKind::Psd,
            "tiff" => MediaKind::Tiff,
            "sidecar" => MediaKind::Sidecar,
            _ => MediaKind::Other,
        }
    }

    /// Kinds that carry media metadata (capture time, dimensions, camera).
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            MediaKind::Raw | MediaKind::Jpeg | MediaKind::Video | MediaKind::Psd | MediaKind::Tiff
        )
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a path by its lowercased extension. AppleDouble resource forks
/// (`._name`) are junk regardless of their claimed extension.
pub fn classify_path(path: &Path) -> MediaKind {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if name.starts_with("._") {
            return MediaKind::Other;
        }
    }
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(e) => e.to_lowercase(),
        None => return MediaKind::Other,
    };
    let ext = ext.as_str();
    if RAW_EXTS.contains(&ext) {
        MediaKind::Raw
    } else if JPEG_EXTS.contains(&ext) {
        MediaKind::Jpeg
    } else if VIDEO_EXTS.contains(&ext) {
        MediaKind::Video
    } else if PSD_EXTS.contains(&ext) {
        MediaKind::Psd
    } else if TIFF_EXTS.contains(&ext) {
        MediaKind::Tiff
    } else if SIDECAR_EXTS.contains(&ext) {
        MediaKind::Sidecar
    } else {
        MediaKind::Other
    }
}

/// Lowercased extension with leading dot, or empty string when there is none.
pub fn normalized_ext(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(e) => format!(".{}", e.to_lowercase()),
        None => String::new(),
    }
}

/// Read chunk size for a file of the given length. Small files use the
/// configured base; very large files scale the chunk up so the read loop
/// stays at a bounded number of hasher updates.
pub fn chunk_size_for(file_len: u64, base_bytes: usize) -> usize {
    let base = base_bytes.max(1) as u64;
    let scaled = (file_len / 128).max(base);
    scaled.min(base * 8) as usize
}

/// Full-content blake3 fingerprint, hex encoded.
pub fn fingerprint_file(path: &Path, base_chunk_bytes: usize) -> io::Result<String> {
    let len = std::fs::metadata(path)?.len();
    fingerprint_with_chunk_size(path, chunk_size_for(len, base_chunk_bytes))
}

pub fn fingerprint_with_chunk_size(path: &Path, chunk_size: usize) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
