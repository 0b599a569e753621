//! Operator settings, stored as text in the `settings` table.

use rusqlite::{Connection, OptionalExtension};

use crate::{DbError, Result};

/// Workers stay idle while this is `true`.
pub const REPORTER_PAUSED: &str = "reporter_paused";

/// Unix time of the last successful wallet refresh, `0` before the first.
pub const LAST_WALLET_REFRESH: &str = "last_wallet_refresh";

/// Written on every open unless the key already holds a value.
pub(crate) const DEFAULTS: [(&str, &str); 2] = [(REPORTER_PAUSED, "false"), (LAST_WALLET_REFRESH, "0")];

fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| row.get(0))
        .optional()?)
}

fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT (key) DO UPDATE SET value = excluded.value",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

pub fn reporter_paused(conn: &Connection) -> Result<bool> {
    Ok(matches!(get(conn, REPORTER_PAUSED)?.as_deref(), Some("true" | "1")))
}

pub fn set_reporter_paused(conn: &Connection, paused: bool) -> Result<()> {
    set(conn, REPORTER_PAUSED, if paused { "true" } else { "false" })
}

/// Time of the last successful wallet refresh. `None` if wallets were
/// never refreshed.
pub fn last_wallet_refresh(conn: &Connection) -> Result<Option<u64>> {
    let Some(value) = get(conn, LAST_WALLET_REFRESH)? else {
        return Ok(None);
    };
    let secs: u64 = value
        .parse()
        .map_err(|e| DbError::Serialization(format!("{LAST_WALLET_REFRESH} = {value:?}: {e}")))?;
    Ok((secs > 0).then_some(secs))
}

pub fn record_wallet_refresh(conn: &Connection, now: u64) -> Result<()> {
    set(conn, LAST_WALLET_REFRESH, &now.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_fresh_database() {
        let conn = test_db();
        assert!(!reporter_paused(&conn).expect("paused"));
        assert_eq!(last_wallet_refresh(&conn).expect("refresh"), None);
    }

    #[test]
    fn test_pause_toggle() {
        let conn = test_db();
        set_reporter_paused(&conn, true).expect("pause");
        assert!(reporter_paused(&conn).expect("paused"));
        set_reporter_paused(&conn, false).expect("resume");
        assert!(!reporter_paused(&conn).expect("paused"));
    }

    #[test]
    fn test_record_wallet_refresh() {
        let conn = test_db();
        record_wallet_refresh(&conn, 1_700_000_000).expect("record");
        assert_eq!(last_wallet_refresh(&conn).expect("refresh"), Some(1_700_000_000));
    }

    #[test]
    fn test_garbage_refresh_time_rejected() {
        let conn = test_db();
        set(&conn, LAST_WALLET_REFRESH, "soon").expect("set");
        assert!(matches!(last_wallet_refresh(&conn), Err(DbError::Serialization(_))));
    }

    #[test]
    fn test_missing_key_reads_as_default() {
        let conn = test_db();
        conn.execute("DELETE FROM settings", []).expect("clear");
        assert!(!reporter_paused(&conn).expect("paused"));
        assert_eq!(last_wallet_refresh(&conn).expect("refresh"), None);
    }
}
