//! Filename descriptiveness scoring and stem normalization.
//!
//! The score decides which copy of a duplicate keeps naming rights: a
//! hand-written name like `family-beach-trip` outranks a camera counter like
//! `IMG_1234`. Normalization collapses editor and copy suffixes so variants
//! of the same shot group together.

/// Camera counter prefixes. A stem matches when the prefix is followed by
/// nothing but digits.
const CAMERA_PREFIXES: &[&str] = &["img_", "dsc_", "dscf", "pxl_", "sam_", "_dsc", "cimg"];

const EDIT_SUFFIXES: &[&str] = &["(copy)", "_copy", "_edit", "-edit"];

fn is_camera_default(stem: &str) -> bool {
    CAMERA_PREFIXES.iter().any(|prefix| {
        stem.strip_prefix(prefix)
            .map_or(false, |rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
    })
}

/// Higher score means a more descriptive, human-chosen name.
pub fn descriptiveness_score(stem: &str) -> i32 {
    let s = stem.to_lowercase();
    let mut score = 0;

    if is_camera_default(&s) {
        score -= 5;
    }
    if s.contains(' ') {
        score += 2;
    }
    if s.contains('-') || s.contains('_') {
        score += 1;
    }

    let letters = s.chars().filter(|c| c.is_alphabetic()).count();
    let digits = s.chars().filter(|c| c.is_ascii_digit()).count();
    if letters > digits {
        score += 2;
    }
    if s.len() >= 12 {
        score += 1;
    }
    score
}

/// Canonical grouping key for a stem: lowercased, with copy/edit suffixes and
/// trailing `(n)` counters stripped, then padding characters trimmed.
pub fn normalize_stem(stem: &str) -> String {
    let mut s = stem.to_lowercase().trim().to_string();

    for suffix in EDIT_SUFFIXES {
        if let Some(stripped) = s.strip_suffix(suffix) {
            s = stripped.to_string();
        }
    }
    s = strip_paren_counter(&s);
    s.trim_matches(|c| c == '_' || c == '-' || c == ' ').to_string()
}

fn strip_paren_counter(s: &str) -> String {
    if let Some(rest) = s.strip_suffix(')') {
        if let Some(open) = rest.rfind('(') {
            let inner = &rest[open + 1..];
            if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
                return rest[..open].to_string();
            }
        }
    }
    s.to_string()
}

/// All digits of a stem, concatenated. Used to match a RAW frame counter to
/// its derived outputs regardless of prefix differences.
pub fn digit_core(stem: &str) -> String {
    stem.chars().filter(|c| c.is_ascii_digit()).collect()
}
