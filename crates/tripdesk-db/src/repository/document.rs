//! Shared plumbing for tables that hold a JSON `payload` column plus a
//! `record_version` stamp.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use tripdesk_core::ports::Versioned;

use crate::error::{DbError, DbResult};

/// Table layout for a versioned record.
pub(crate) struct Table {
    pub name: &'static str,
    pub key_column: &'static str,
    /// ORDER BY clause for full scans.
    pub order_by: &'static str,
}

/// Sets the version the record will have once `expected` is replaced.
pub(crate) fn stamp<T: Versioned>(mut record: T, expected: u64) -> T {
    record.set_record_version(expected + 1);
    record
}

pub(crate) fn encode<T: Serialize>(record: &T) -> DbResult<String> {
    Ok(serde_json::to_string(record)?)
}

pub(crate) fn decode<T: DeserializeOwned>(payload: &str) -> DbResult<T> {
    Ok(serde_json::from_str(payload)?)
}

/// SQLite integers are signed.
pub(crate) fn sql_version(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

pub(crate) async fn fetch_payload(
    pool: &SqlitePool,
    table: &Table,
    id: &str,
) -> DbResult<Option<String>> {
    let sql = format!(
        "SELECT payload FROM {} WHERE {} = ?1",
        table.name, table.key_column
    );
    let payload = sqlx::query_scalar::<_, String>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(payload)
}

pub(crate) async fn fetch_all<T: DeserializeOwned>(
    pool: &SqlitePool,
    table: &Table,
) -> DbResult<Vec<T>> {
    let sql = format!("SELECT payload FROM {} ORDER BY {}", table.name, table.order_by);
    let payloads = sqlx::query_scalar::<_, String>(&sql).fetch_all(pool).await?;
    payloads.iter().map(|p| decode(p)).collect()
}

/// Builds the conflict error for a write that matched no row.
///
/// A missing row reports `actual: 0`.
pub(crate) async fn rejected_write<T: Versioned>(
    pool: &SqlitePool,
    table: &Table,
    id: &str,
    expected: u64,
) -> DbError {
    let sql = format!(
        "SELECT record_version FROM {} WHERE {} = ?1",
        table.name, table.key_column
    );
    let actual = match sqlx::query_scalar::<_, i64>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
    {
        Ok(found) => found.map_or(0, |v| v.max(0) as u64),
        Err(e) => return e.into(),
    };
    DbError::conflict(T::ENTITY, id, expected, actual)
}
