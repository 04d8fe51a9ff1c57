use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{Connection, OpenFlags};
use tracing::info;

use crate::errors::AppResult;

pub struct DatabaseContext {
    pub connection: Connection,
    pub path: PathBuf,
}

pub fn bootstrap<P: AsRef<Path>>(data_dir: P, database_file: &str) -> AppResult<DatabaseContext> {
    let data_dir = data_dir.as_ref();
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join(database_file);

    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
    let connection = Connection::open_with_flags(&db_path, flags)?;
    apply_pragmas(&connection)?;
    run_migrations(&connection)?;

    info!(
        target: "database_bootstrap",
        path = %db_path.display(),
        "address store ready"
    );

    Ok(DatabaseContext {
        connection,
        path: db_path,
    })
}

/// In-memory store with the same schema, for tests.
pub fn open_in_memory() -> AppResult<Connection> {
    let connection = Connection::open_in_memory()?;
    run_migrations(&connection)?;
    Ok(connection)
}

fn apply_pragmas(connection: &Connection) -> AppResult<()> {
    connection.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;
        "#,
    )?;
    Ok(())
}

fn run_migrations(connection: &Connection) -> AppResult<()> {
    // lng/lat are set together or not at all; the pair is the record's
    // "displayable on the map" marker.
    connection.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS addresses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            address TEXT NOT NULL,
            street_name TEXT NOT NULL,
            street_no TEXT NOT NULL,
            date TEXT NOT NULL,
            lng REAL,
            lat REAL,
            geocoded_at TEXT,
            created_at TEXT NOT NULL DEFAULT (DATETIME('now')),
            CHECK ((lng IS NULL) = (lat IS NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_addresses_address ON addresses(address);
        CREATE INDEX IF NOT EXISTS idx_addresses_street_name ON addresses(street_name);
        "#,
    )?;
    Ok(())
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn runs_migrations_and_creates_table() {
        let dir = tempdir().unwrap();
        let ctx = bootstrap(dir.path(), "test.db").unwrap();

        let count: i64 = ctx
            .connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='addresses'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert!(ctx.path.ends_with("test.db"));
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let dir = tempdir().unwrap();
        drop(bootstrap(dir.path(), "again.db").unwrap());
        let ctx = bootstrap(dir.path(), "again.db").unwrap();
        ctx.connection
            .execute(
                "INSERT INTO addresses (address, street_name, street_no, date)
                VALUES ('250 ACADEMY ST', 'ACADEMY ST', '250', '1993-07-12')",
                [],
            )
            .unwrap();
    }

    #[test]
    fn rejects_half_set_coordinates() {
        let conn = open_in_memory().unwrap();
        let result = conn.execute(
            "INSERT INTO addresses (address, street_name, street_no, date, lng, lat)
            VALUES ('11 APOLLO ST', 'APOLLO ST', '11', '2021-08-27', -74.08, NULL)",
            [],
        );
        assert!(result.is_err());
    }
}
