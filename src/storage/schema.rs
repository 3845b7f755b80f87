//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the listing database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track ingest runs
CREATE TABLE IF NOT EXISTS ingest_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per stored observation; in append mode the same listing id may
-- own several rows, the highest row_id being the latest
CREATE TABLE IF NOT EXISTS property_listings (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL,
    source TEXT NOT NULL,
    external_id TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    property_type TEXT NOT NULL,
    location TEXT,
    price INTEGER,
    size REAL,
    layout TEXT,
    year_built INTEGER,
    building_type TEXT,
    description TEXT,
    images TEXT NOT NULL DEFAULT '[]',
    features TEXT NOT NULL DEFAULT '[]',
    detail_incomplete INTEGER NOT NULL DEFAULT 0,
    title_translated TEXT,
    description_translated TEXT,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    run_id INTEGER REFERENCES ingest_runs(id)
);

CREATE INDEX IF NOT EXISTS idx_listings_id ON property_listings(id);
CREATE INDEX IF NOT EXISTS idx_listings_source ON property_listings(source);
"#;

/// Initializes the database schema
///
/// Safe to run against an existing database.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["ingest_runs", "property_listings"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_listing_id_is_not_unique() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for _ in 0..2 {
            conn.execute(
                "INSERT INTO property_listings (id, source, external_id, url, title, property_type,
                 first_seen_at, last_seen_at, content_hash)
                 VALUES ('abc', 'suumo', '1', 'https://suumo.jp/1', 't', 'rent', 'x', 'x', 'h')",
                [],
            )
            .unwrap();
        }

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM property_listings WHERE id = 'abc'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(rows, 2);
    }
}
