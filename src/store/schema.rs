//! SQLite schema for the aggregated counts.

use rusqlite::Connection;

/// Tables and indexes, created idempotently on open
pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS modules (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    path TEXT NOT NULL UNIQUE,
    base INTEGER NOT NULL,
    main INTEGER NOT NULL,
    calls INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS modules_index ON modules(name, path);

CREATE TABLE IF NOT EXISTS functions (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    module INTEGER,
    offset INTEGER NOT NULL,
    calls INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY(module) REFERENCES modules(id)
);
";

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('modules', 'functions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }
}
