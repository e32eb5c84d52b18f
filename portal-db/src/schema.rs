//! Schema creation and lazy column migrations

use rusqlite::Connection;

use crate::error::DbResult;

/// Create tables if absent and apply column migrations to an existing
/// database. Safe to run on every startup.
pub fn initialize(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            username      TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role          TEXT NOT NULL DEFAULT 'user',
            active        INTEGER NOT NULL DEFAULT 1,
            email         TEXT,
            created_at    TEXT
        );

        CREATE TABLE IF NOT EXISTS invites (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            code       TEXT NOT NULL UNIQUE,
            country    TEXT,
            created_by TEXT,
            created_at TEXT,
            used_by    TEXT,
            used_at    TEXT
        );
        "#,
    )?;

    // Databases created before these columns existed.
    if !column_exists(conn, "users", "email")? {
        conn.execute("ALTER TABLE users ADD COLUMN email TEXT", [])?;
    }
    if !column_exists(conn, "invites", "country")? {
        conn.execute("ALTER TABLE invites ADD COLUMN country TEXT", [])?;
    }

    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
