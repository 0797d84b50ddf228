use rusqlite::{Connection, OptionalExtension};

pub const SCHEMA_VERSION: i32 = 1;

/// Name of the collection events are appended to
pub const COLLECTION: &str = "tracks";

/// Create tables if they do not exist yet (idempotent; existing rows are kept)
pub fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Metadata table
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- One row per tracked event; id is store-assigned
        CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY,
            event TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            url TEXT NOT NULL,
            title TEXT NOT NULL,
            ts INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tracks_event ON tracks(event);
        CREATE INDEX IF NOT EXISTS idx_tracks_ts ON tracks(ts);
        "#,
    )
}

/// Check whether the events collection already exists
pub fn collection_exists(conn: &Connection) -> rusqlite::Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            [COLLECTION],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Set a metadata key
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
        [key, value],
    )?;
    Ok(())
}

/// Set a metadata key only if it is not present
pub fn init_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO meta (key, value) VALUES (?, ?)",
        [key, value],
    )?;
    Ok(())
}

/// Get a metadata key
pub fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM meta WHERE key = ?", [key], |row| {
        row.get(0)
    })
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!collection_exists(&conn).unwrap());

        create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO tracks (event, url, title, ts) VALUES ('click', 'u', 't', 1)",
            [],
        )
        .unwrap();
        create_tables(&conn).unwrap();

        assert!(collection_exists(&conn).unwrap());
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_init_meta_keeps_first_value() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        init_meta(&conn, "created_at", "first").unwrap();
        init_meta(&conn, "created_at", "second").unwrap();
        set_meta(&conn, "version", "1").unwrap();

        assert_eq!(get_meta(&conn, "created_at").unwrap().as_deref(), Some("first"));
        assert_eq!(get_meta(&conn, "version").unwrap().as_deref(), Some("1"));
        assert_eq!(get_meta(&conn, "missing").unwrap(), None);
    }
}
