//! Query layer for the catalog. All reads and writes go through these
//! methods; nothing else touches SQL.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::models::{
    datetime_from_db, datetime_to_db, CandidateRecord, FileRecord, JpegPlanRow, LineageRow,
    MediaMetadata, PrimaryPlanRow, SidecarPlanRow, UnmatchedRaw, UpsertOutcome,
};
use super::Catalog;
use crate::error::Error;
use crate::identity::MediaKind;

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

fn file_record_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        fingerprint: row.get(1)?,
        kind: MediaKind::parse(&row.get::<_, String>(2)?),
        ext: row.get(3)?,
        orig_name: row.get(4)?,
        orig_path: row.get(5)?,
        dest_path: row.get(6)?,
        size_bytes: row.get(7)?,
        is_seed: row.get::<_, i64>(8)? != 0,
        name_score: row.get(9)?,
        first_seen_at: row.get(10)?,
        last_seen_at: row.get(11)?,
    })
}

const FILE_COLUMNS: &str = "id, fingerprint, kind, ext, orig_name, orig_path, dest_path, \
                            size_bytes, is_seed, name_score, first_seen_at, last_seen_at";

impl Catalog {
    /// Insert a new fingerprint or refresh an existing row.
    ///
    /// An existing row only surrenders its canonical name and path to a
    /// strictly higher-priority occurrence: seed beats non-seed, then a
    /// higher descriptiveness score. Ties keep the first-seen identity.
    /// `last_seen_at` is refreshed either way.
    pub fn upsert_file(&self, rec: &CandidateRecord) -> Result<UpsertOutcome, Error> {
        let now = now_iso();
        let existing = self
            .conn
            .query_row(
                "SELECT id, is_seed, name_score FROM files WHERE fingerprint = ?1",
                params![rec.fingerprint],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)? != 0,
                        row.get::<_, i32>(2)?,
                    ))
                },
            )
            .optional()?;

        match existing {
            None => {
                self.conn.execute(
                    "INSERT INTO files (fingerprint, kind, ext, orig_name, orig_path, \
                                        size_bytes, is_seed, name_score, first_seen_at, last_seen_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                    params![
                        rec.fingerprint,
                        rec.kind.as_str(),
                        rec.ext,
                        rec.orig_name,
                        rec.orig_path.to_string_lossy().into_owned(),
                        rec.size_bytes,
                        rec.is_seed as i64,
                        rec.name_score,
                        now,
                    ],
                )?;
                Ok(UpsertOutcome {
                    file_id: self.conn.last_insert_rowid(),
                    created: true,
                    promoted: false,
                })
            }
            Some((file_id, existing_seed, existing_score)) => {
                let promote = (rec.is_seed, rec.name_score) > (existing_seed, existing_score);
                if promote {
                    debug!(
                        fingerprint = %rec.fingerprint,
                        new_name = %rec.orig_name,
                        "promoting canonical occurrence"
                    );
                    self.conn.execute(
                        "UPDATE files
                         SET orig_name = ?1, orig_path = ?2, is_seed = ?3, name_score = ?4,
                             last_seen_at = ?5
                         WHERE id = ?6",
                        params![
                            rec.orig_name,
                            rec.orig_path.to_string_lossy().into_owned(),
                            rec.is_seed as i64,
                            rec.name_score,
                            now,
                            file_id,
                        ],
                    )?;
                } else {
                    self.conn.execute(
                        "UPDATE files SET last_seen_at = ?1 WHERE id = ?2",
                        params![now, file_id],
                    )?;
                }
                Ok(UpsertOutcome {
                    file_id,
                    created: false,
                    promoted: promote,
                })
            }
        }
    }

    pub fn upsert_media_metadata(&self, file_id: i64, meta: &MediaMetadata) -> Result<(), Error> {
        let capture = meta.capture_datetime.as_ref().map(datetime_to_db);
        self.conn.execute(
            "INSERT OR REPLACE INTO media_metadata
             (file_id, capture_datetime, camera_model, lens_model, width, height,
              duration_sec, aspect_ratio, perceptual_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                file_id,
                capture,
                meta.camera_model,
                meta.lens_model,
                meta.width,
                meta.height,
                meta.duration_sec,
                meta.aspect_ratio,
                meta.perceptual_hash,
            ],
        )?;
        Ok(())
    }

    /// Assign a destination path, exactly once per record.
    pub fn set_destination(&self, fingerprint: &str, dest: &Path) -> Result<(), Error> {
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT dest_path FROM files WHERE fingerprint = ?1",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| Error::Other(format!("unknown fingerprint: {fingerprint}")))?;

        if let Some(existing) = existing {
            return Err(Error::DestinationAssigned {
                fingerprint: fingerprint.to_string(),
                existing: existing.into(),
            });
        }
        self.conn.execute(
            "UPDATE files SET dest_path = ?1 WHERE fingerprint = ?2",
            params![dest.to_string_lossy().into_owned(), fingerprint],
        )?;
        Ok(())
    }

    pub fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<FileRecord>, Error> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE fingerprint = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![fingerprint], file_record_from_row)
            .optional()?)
    }

    pub fn get_media_metadata(&self, file_id: i64) -> Result<Option<MediaMetadata>, Error> {
        Ok(self
            .conn
            .query_row(
                "SELECT capture_datetime, camera_model, lens_model, width, height,
                        duration_sec, aspect_ratio, perceptual_hash
                 FROM media_metadata WHERE file_id = ?1",
                params![file_id],
                |row| {
                    Ok(MediaMetadata {
                        capture_datetime: row
                            .get::<_, Option<String>>(0)?
                            .and_then(|s| datetime_from_db(&s)),
                        camera_model: row.get(1)?,
                        lens_model: row.get(2)?,
                        width: row.get(3)?,
                        height: row.get(4)?,
                        duration_sec: row.get(5)?,
                        aspect_ratio: row.get(6)?,
                        perceptual_hash: row.get(7)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn fetch_by_kind(&self, kind: MediaKind) -> Result<Vec<FileRecord>, Error> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE kind = ?1 ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![kind.as_str()], file_record_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// `(id, orig_path)` pairs for one kind, in first-seen order.
    pub fn fetch_paths_by_kind(&self, kind: MediaKind) -> Result<Vec<(i64, String)>, Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, orig_path FROM files WHERE kind = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![kind.as_str()], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Links a sidecar to a RAW. Returns false when the sidecar is already
    /// claimed, which keeps repeated runs idempotent.
    pub fn insert_sidecar_link(&self, sidecar_id: i64, raw_id: i64) -> Result<bool, Error> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO sidecar_links (sidecar_file_id, raw_file_id) VALUES (?1, ?2)",
            params![sidecar_id, raw_id],
        )?;
        Ok(changed > 0)
    }

    pub fn insert_output_link(
        &self,
        raw_id: i64,
        output_id: i64,
        method: &str,
        confidence: i64,
    ) -> Result<bool, Error> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO output_links (raw_file_id, output_file_id, link_method, confidence)
             VALUES (?1, ?2, ?3, ?4)",
            params![raw_id, output_id, method, confidence],
        )?;
        Ok(changed > 0)
    }

    /// RAWs that still lack an output link, with the fields lineage matching
    /// needs.
    pub fn fetch_unlinked_raws(&self) -> Result<Vec<LineageRow>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.orig_name, m.capture_datetime, m.perceptual_hash
             FROM files f
             LEFT JOIN media_metadata m ON m.file_id = f.id
             WHERE f.kind = 'raw'
               AND f.id NOT IN (SELECT raw_file_id FROM output_links)
             ORDER BY f.id",
        )?;
        let rows = stmt.query_map([], lineage_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Rendered images that can stand as a RAW's derived output.
    pub fn fetch_output_candidates(&self) -> Result<Vec<LineageRow>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.orig_name, m.capture_datetime, m.perceptual_hash
             FROM files f
             LEFT JOIN media_metadata m ON m.file_id = f.id
             WHERE f.kind IN ('jpeg', 'tiff')
             ORDER BY f.id",
        )?;
        let rows = stmt.query_map([], lineage_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Unplanned rows that go straight to a dated directory.
    pub fn fetch_unplanned_primary(&self) -> Result<Vec<PrimaryPlanRow>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT f.fingerprint, f.kind, f.orig_name, f.orig_path, m.capture_datetime
             FROM files f
             LEFT JOIN media_metadata m ON m.file_id = f.id
             WHERE f.kind IN ('raw', 'video', 'tiff', 'psd') AND f.dest_path IS NULL
             ORDER BY f.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PrimaryPlanRow {
                fingerprint: row.get(0)?,
                kind: MediaKind::parse(&row.get::<_, String>(1)?),
                orig_name: row.get(2)?,
                orig_path: row.get(3)?,
                capture_datetime: row
                    .get::<_, Option<String>>(4)?
                    .and_then(|s| datetime_from_db(&s)),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn fetch_unplanned_jpegs(&self) -> Result<Vec<JpegPlanRow>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.fingerprint, f.orig_name, f.orig_path, f.is_seed, f.name_score,
                    m.capture_datetime, m.width, m.height
             FROM files f
             LEFT JOIN media_metadata m ON m.file_id = f.id
             WHERE f.kind = 'jpeg' AND f.dest_path IS NULL
             ORDER BY f.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(JpegPlanRow {
                id: row.get(0)?,
                fingerprint: row.get(1)?,
                orig_name: row.get(2)?,
                orig_path: row.get(3)?,
                is_seed: row.get::<_, i64>(4)? != 0,
                name_score: row.get(5)?,
                capture_datetime: row
                    .get::<_, Option<String>>(6)?
                    .and_then(|s| datetime_from_db(&s)),
                width: row.get(7)?,
                height: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Unplanned sidecars whose linked RAW already has a destination.
    pub fn fetch_unplanned_sidecars(&self) -> Result<Vec<SidecarPlanRow>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT s.fingerprint, s.orig_name, r.dest_path
             FROM sidecar_links l
             JOIN files s ON s.id = l.sidecar_file_id
             JOIN files r ON r.id = l.raw_file_id
             WHERE s.dest_path IS NULL AND r.dest_path IS NOT NULL
             ORDER BY s.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SidecarPlanRow {
                fingerprint: row.get(0)?,
                orig_name: row.get(1)?,
                raw_dest_path: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every destination path already assigned, for seeding per-directory
    /// collision sets across runs.
    pub fn fetch_assigned_destinations(&self) -> Result<Vec<String>, Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT dest_path FROM files WHERE dest_path IS NOT NULL")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// RAWs with no output link, for the unmatched report.
    pub fn fetch_unmatched_raws(&self) -> Result<Vec<UnmatchedRaw>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.orig_path, f.dest_path, m.capture_datetime, m.camera_model
             FROM files f
             LEFT JOIN media_metadata m ON m.file_id = f.id
             WHERE f.kind = 'raw'
               AND f.id NOT IN (SELECT raw_file_id FROM output_links)
             ORDER BY f.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(UnmatchedRaw {
                id: row.get(0)?,
                orig_path: row.get(1)?,
                dest_path: row.get(2)?,
                capture_datetime: row
                    .get::<_, Option<String>>(3)?
                    .and_then(|s| datetime_from_db(&s)),
                camera_model: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn count_files(&self) -> Result<i64, Error> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?)
    }

    pub fn count_sidecar_links(&self) -> Result<i64, Error> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM sidecar_links", [], |row| row.get(0))?)
    }

    pub fn count_output_links(&self) -> Result<i64, Error> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM output_links", [], |row| row.get(0))?)
    }
}

fn lineage_row(row: &Row<'_>) -> rusqlite::Result<LineageRow> {
    Ok(LineageRow {
        id: row.get(0)?,
        orig_name: row.get(1)?,
        capture_datetime: row
            .get::<_, Option<String>>(2)?
            .and_then(|s| datetime_from_db(&s)),
        perceptual_hash: row.get(3)?,
    })
}
