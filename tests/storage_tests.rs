//! Catalog storage behavior: upsert priority, write-once destinations,
//! metadata rows.

use std::path::{Path, PathBuf};

use shutter_sort::catalog::models::{CandidateRecord, MediaMetadata};
use shutter_sort::catalog::Catalog;
use shutter_sort::error::Error;
use shutter_sort::identity::MediaKind;
use shutter_sort::metadata::DatetimeSource;

fn candidate(
    fingerprint: &str,
    kind: MediaKind,
    name: &str,
    is_seed: bool,
    name_score: i32,
) -> CandidateRecord {
    CandidateRecord {
        fingerprint: fingerprint.to_string(),
        kind,
        ext: Path::new(name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default(),
        orig_name: name.to_string(),
        orig_path: PathBuf::from(format!("/src/{name}")),
        size_bytes: 1024,
        is_seed,
        name_score,
        metadata: MediaMetadata::default(),
        capture_source: DatetimeSource::FileMtime,
        failed_steps: vec![],
    }
}

#[test]
fn insert_then_fetch_round_trips() {
    let catalog = Catalog::open_in_memory().unwrap();
    let outcome = catalog
        .upsert_file(&candidate("fp1", MediaKind::Raw, "IMG_0001.CR2", false, -4))
        .unwrap();
    assert!(outcome.created);
    assert!(!outcome.promoted);

    let rec = catalog.get_by_fingerprint("fp1").unwrap().unwrap();
    assert_eq!(rec.id, outcome.file_id);
    assert_eq!(rec.kind, MediaKind::Raw);
    assert_eq!(rec.ext, ".cr2");
    assert_eq!(rec.orig_name, "IMG_0001.CR2");
    assert_eq!(rec.dest_path, None);
    assert!(!rec.is_seed);
    assert_eq!(rec.name_score, -4);
    assert_eq!(rec.first_seen_at, rec.last_seen_at);
}

#[test]
fn duplicate_with_equal_priority_keeps_first_identity() {
    let catalog = Catalog::open_in_memory().unwrap();
    catalog
        .upsert_file(&candidate("fp1", MediaKind::Jpeg, "IMG_0001.JPG", false, -4))
        .unwrap();
    let outcome = catalog
        .upsert_file(&candidate("fp1", MediaKind::Jpeg, "IMG_0002.JPG", false, -4))
        .unwrap();
    assert!(!outcome.created);
    assert!(!outcome.promoted);

    let rec = catalog.get_by_fingerprint("fp1").unwrap().unwrap();
    assert_eq!(rec.orig_name, "IMG_0001.JPG");
    assert_eq!(catalog.count_files().unwrap(), 1);
}

#[test]
fn higher_score_promotes_canonical_name() {
    let catalog = Catalog::open_in_memory().unwrap();
    catalog
        .upsert_file(&candidate("fp1", MediaKind::Jpeg, "IMG_0001.JPG", false, -4))
        .unwrap();
    let outcome = catalog
        .upsert_file(&candidate("fp1", MediaKind::Jpeg, "beach-day.JPG", false, 3))
        .unwrap();
    assert!(outcome.promoted);

    let rec = catalog.get_by_fingerprint("fp1").unwrap().unwrap();
    assert_eq!(rec.orig_name, "beach-day.JPG");
    assert_eq!(rec.name_score, 3);
}

#[test]
fn seed_outranks_any_score() {
    let catalog = Catalog::open_in_memory().unwrap();
    catalog
        .upsert_file(&candidate("fp1", MediaKind::Jpeg, "beach-day.JPG", false, 3))
        .unwrap();
    let outcome = catalog
        .upsert_file(&candidate("fp1", MediaKind::Jpeg, "IMG_0001.JPG", true, -4))
        .unwrap();
    assert!(outcome.promoted);

    let rec = catalog.get_by_fingerprint("fp1").unwrap().unwrap();
    assert!(rec.is_seed);
    assert_eq!(rec.orig_name, "IMG_0001.JPG");
}

#[test]
fn non_seed_never_demotes_a_seed() {
    let catalog = Catalog::open_in_memory().unwrap();
    catalog
        .upsert_file(&candidate("fp1", MediaKind::Jpeg, "IMG_0001.JPG", true, -4))
        .unwrap();
    let outcome = catalog
        .upsert_file(&candidate("fp1", MediaKind::Jpeg, "beach-day.JPG", false, 3))
        .unwrap();
    assert!(!outcome.promoted);

    let rec = catalog.get_by_fingerprint("fp1").unwrap().unwrap();
    assert!(rec.is_seed);
    assert_eq!(rec.orig_name, "IMG_0001.JPG");
}

#[test]
fn destination_is_write_once() {
    let catalog = Catalog::open_in_memory().unwrap();
    catalog
        .upsert_file(&candidate("fp1", MediaKind::Raw, "IMG_0001.CR2", false, -4))
        .unwrap();

    catalog
        .set_destination("fp1", Path::new("/dest/raw/2020/2020-04/IMG_0001.CR2"))
        .unwrap();

    let err = catalog
        .set_destination("fp1", Path::new("/dest/raw/2021/2021-01/other.CR2"))
        .unwrap_err();
    match err {
        Error::DestinationAssigned {
            fingerprint,
            existing,
        } => {
            assert_eq!(fingerprint, "fp1");
            assert_eq!(existing, PathBuf::from("/dest/raw/2020/2020-04/IMG_0001.CR2"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The first assignment survives untouched.
    let rec = catalog.get_by_fingerprint("fp1").unwrap().unwrap();
    assert_eq!(
        rec.dest_path.as_deref(),
        Some("/dest/raw/2020/2020-04/IMG_0001.CR2")
    );
}

#[test]
fn set_destination_rejects_unknown_fingerprint() {
    let catalog = Catalog::open_in_memory().unwrap();
    assert!(catalog
        .set_destination("missing", Path::new("/dest/x"))
        .is_err());
}

#[test]
fn media_metadata_round_trips_and_replaces() {
    let catalog = Catalog::open_in_memory().unwrap();
    let outcome = catalog
        .upsert_file(&candidate("fp1", MediaKind::Jpeg, "IMG_0001.JPG", false, -4))
        .unwrap();

    let dt = chrono::NaiveDate::from_ymd_opt(2020, 4, 1)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();
    let meta = MediaMetadata {
        capture_datetime: Some(dt),
        camera_model: Some("Canon EOS R5".to_string()),
        width: Some(4000),
        height: Some(3000),
        aspect_ratio: Some(4000.0 / 3000.0),
        ..Default::default()
    };
    catalog.upsert_media_metadata(outcome.file_id, &meta).unwrap();

    let stored = catalog.get_media_metadata(outcome.file_id).unwrap().unwrap();
    assert_eq!(stored.capture_datetime, Some(dt));
    assert_eq!(stored.camera_model.as_deref(), Some("Canon EOS R5"));
    assert_eq!(stored.width, Some(4000));

    // Re-upsert replaces the row rather than stacking a second one.
    let updated = MediaMetadata {
        capture_datetime: Some(dt),
        perceptual_hash: Some("abcd1234".to_string()),
        ..Default::default()
    };
    catalog.upsert_media_metadata(outcome.file_id, &updated).unwrap();
    let stored = catalog.get_media_metadata(outcome.file_id).unwrap().unwrap();
    assert_eq!(stored.perceptual_hash.as_deref(), Some("abcd1234"));
    assert_eq!(stored.camera_model, None);
}

#[test]
fn truncate_clears_every_table() {
    let catalog = Catalog::open_in_memory().unwrap();
    let raw = catalog
        .upsert_file(&candidate("fp1", MediaKind::Raw, "IMG_0001.CR2", false, -4))
        .unwrap();
    let sidecar = catalog
        .upsert_file(&candidate("fp2", MediaKind::Sidecar, "IMG_0001.xmp", false, -4))
        .unwrap();
    catalog
        .insert_sidecar_link(sidecar.file_id, raw.file_id)
        .unwrap();

    catalog.truncate_all().unwrap();
    assert_eq!(catalog.count_files().unwrap(), 0);
    assert_eq!(catalog.count_sidecar_links().unwrap(), 0);
}
