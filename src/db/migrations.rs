//! Forward-only schema migrations.
//!
//! The version lives in `schema_meta`; [`run_migrations`] walks it up to
//! [`CURRENT_SCHEMA_VERSION`] one step at a time.

use rusqlite::Connection;

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Model id assumed for vectors written before the model was tracked.
pub const LEGACY_EMBEDDING_MODEL: &str = "local:all-MiniLM-L6-v2";

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

/// The embedding model the stored vectors were produced with, if recorded.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
        [],
        |row| row.get::<_, String>(0),
    ) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(())
}

/// Each step runs in its own transaction together with the version bump.
pub fn run_migrations(conn: &mut Connection) -> rusqlite::Result<()> {
    let mut version = get_schema_version(conn)?;
    tracing::debug!(schema_version = version, target = CURRENT_SCHEMA_VERSION, "checking migrations");

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(from = version, to = next, "running migration");

        let tx = conn.transaction()?;
        match next {
            2 => record_embedding_model(&tx)?,
            _ => {
                tracing::error!(version = next, "unknown migration target");
                break;
            }
        }
        set_schema_version(&tx, next)?;
        tx.commit()?;
        version = next;
    }

    Ok(())
}

/// v1 → v2. Existing vectors predate tracking and came from the local model;
/// an empty database is labelled by whichever embedder first opens it.
fn record_embedding_model(conn: &Connection) -> rusqlite::Result<()> {
    let facts: i64 = conn.query_row("SELECT count(*) FROM facts", [], |r| r.get(0))?;
    if facts > 0 {
        conn.execute(
            "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
            [LEGACY_EMBEDDING_MODEL],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_db() -> Connection {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        crate::db::schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn fresh_db_starts_at_version_1() {
        let conn = fresh_db();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
        assert!(get_embedding_model(&conn).unwrap().is_none());
    }

    #[test]
    fn migrations_leave_empty_database_unlabelled() {
        let mut conn = fresh_db();
        run_migrations(&mut conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
        assert!(get_embedding_model(&conn).unwrap().is_none());
    }

    #[test]
    fn populated_v1_database_is_labelled_legacy() {
        let mut conn = fresh_db();
        conn.execute(
            "INSERT INTO facts (id, content, metadata, created_at, last_updated) \
             VALUES ('a', 'Born in Boston', '{}', 'now', 'now')",
            [],
        )
        .unwrap();
        run_migrations(&mut conn).unwrap();
        assert_eq!(
            get_embedding_model(&conn).unwrap().as_deref(),
            Some(LEGACY_EMBEDDING_MODEL)
        );
    }

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = fresh_db();
        run_migrations(&mut conn).unwrap();
        set_embedding_model(&conn, "custom-model").unwrap();
        run_migrations(&mut conn).unwrap();
        assert_eq!(get_embedding_model(&conn).unwrap().as_deref(), Some("custom-model"));
    }
}
