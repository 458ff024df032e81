//! SQLite-backed catalog: the only durable state in the system.

pub mod models;
mod queries;

use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::error::Error;

pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    pub fn open(db_path: &Path) -> Result<Catalog, Error> {
        let conn = Connection::open(db_path)?;
        let catalog = Catalog { conn };
        catalog.configure_pragmas()?;
        catalog.migrate_schema()?;
        info!("catalog opened at {}", db_path.display());
        Ok(catalog)
    }

    /// In-memory catalog for tests and dry runs.
    pub fn open_in_memory() -> Result<Catalog, Error> {
        let conn = Connection::open_in_memory()?;
        let catalog = Catalog { conn };
        catalog.configure_pragmas()?;
        catalog.migrate_schema()?;
        Ok(catalog)
    }

    fn configure_pragmas(&self) -> Result<(), Error> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(())
    }

    fn migrate_schema(&self) -> Result<(), Error> {
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Wipes every table. Used by the `truncate-db` command.
    pub fn truncate_all(&self) -> Result<(), Error> {
        self.conn.execute_batch(
            "DELETE FROM output_links;
             DELETE FROM sidecar_links;
             DELETE FROM media_metadata;
             DELETE FROM files;",
        )?;
        info!("catalog truncated");
        Ok(())
    }
}
