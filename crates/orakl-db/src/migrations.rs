//! Schema migrations.
//!
//! `PRAGMA user_version` holds the applied schema version. Each step runs in
//! its own transaction together with the version bump.

use rusqlite::Connection;

use crate::queries::settings;
use crate::{schema, DbError, Result, SCHEMA_VERSION};

/// SQL batch that brings the schema from version `i` to `i + 1`.
const STEPS: [&str; SCHEMA_VERSION as usize] = [schema::SCHEMA_V1];

/// Apply pending steps, then fill in missing default settings.
pub fn run(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if current > SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "database schema v{current} is newer than supported v{SCHEMA_VERSION}"
        )));
    }

    for (version, batch) in (1u32..).zip(STEPS).skip(current as usize) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(batch)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        tracing::info!(version, "schema migrated");
    }

    insert_default_settings(conn)
}

fn insert_default_settings(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)")?;
    for (key, value) in settings::DEFAULTS {
        stmt.execute([key, value])?;
    }
    Ok(())
}
