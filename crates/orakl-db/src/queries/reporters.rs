//! Reporter wallet records.

use rusqlite::Connection;

use orakl_types::Address;

use crate::{DbError, Result};

/// A reporter wallet row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReporterRow {
    pub id: i64,
    pub service: String,
    pub chain: String,
    /// Aggregator the wallet reports to.
    pub contract: Address,
    /// Oracle identity the wallet signs as.
    pub address: Address,
    /// Key handle at the external signer.
    pub key_id: String,
    pub active: bool,
    pub created_at: u64,
}

/// Insert a reporter, or replace the wallet of an existing
/// `(service, chain, contract)` entry and reactivate it.
pub fn upsert(
    conn: &Connection,
    service: &str,
    chain: &str,
    contract: &Address,
    address: &Address,
    key_id: &str,
    created_at: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO reporters (service, chain, contract, address, key_id, active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
         ON CONFLICT (service, chain, contract)
         DO UPDATE SET address = excluded.address, key_id = excluded.key_id, active = 1",
        rusqlite::params![
            service,
            chain,
            contract.to_string(),
            address.to_string(),
            key_id,
            created_at as i64,
        ],
    )?;
    Ok(())
}

/// Enable or disable the reporter of `contract`.
pub fn set_active(
    conn: &Connection,
    service: &str,
    chain: &str,
    contract: &Address,
    active: bool,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE reporters SET active = ?1 WHERE service = ?2 AND chain = ?3 AND contract = ?4",
        rusqlite::params![active, service, chain, contract.to_string()],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("reporter for {contract}")));
    }
    Ok(())
}

/// Active reporters of one service on one chain.
pub fn list_active(conn: &Connection, service: &str, chain: &str) -> Result<Vec<ReporterRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, service, chain, contract, address, key_id, active, created_at
         FROM reporters WHERE service = ?1 AND chain = ?2 AND active = 1 ORDER BY id",
    )?;

    let raw = stmt
        .query_map(rusqlite::params![service, chain], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, bool>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(id, service, chain, contract, address, key_id, active, created_at)| {
            Ok(ReporterRow {
                id,
                service,
                chain,
                contract: parse_address(&contract)?,
                address: parse_address(&address)?,
                key_id,
                active,
                created_at: created_at as u64,
            })
        })
        .collect()
}

pub(crate) fn parse_address(s: &str) -> Result<Address> {
    s.parse()
        .map_err(|e: orakl_types::TypesError| DbError::Serialization(e.to_string()))
}
