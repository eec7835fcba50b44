//! # Audit Log
//!
//! Append-only. Rows are inserted once and never updated; snapshots are
//! stored as JSON text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use tracing::debug;
use tripdesk_core::audit::{AuditLogEntry, EntityType};
use tripdesk_core::ports::AuditSink;
use tripdesk_core::{CoreResult, Role};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct SqliteAuditLog {
    pool: SqlitePool,
}

/// Raw `audit_log` row.
#[derive(Debug, FromRow)]
struct AuditRow {
    id: String,
    entity_type: String,
    entity_id: String,
    action: String,
    previous_value: Option<String>,
    new_value: Option<String>,
    actor_id: String,
    actor_role: String,
    timestamp: DateTime<Utc>,
}

impl AuditRow {
    fn into_entry(self) -> DbResult<AuditLogEntry> {
        Ok(AuditLogEntry {
            id: self.id,
            entity_type: parse_label(&self.entity_type)?,
            entity_id: self.entity_id,
            action: parse_label(&self.action)?,
            previous_value: self
                .previous_value
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            new_value: self
                .new_value
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            actor_id: self.actor_id,
            actor_role: Role::from_str(&self.actor_role)
                .map_err(|e| DbError::Serialization(e.to_string()))?,
            timestamp: self.timestamp,
        })
    }
}

/// Parses an upper-case enum label through its serde representation.
fn parse_label<T: DeserializeOwned>(label: &str) -> DbResult<T> {
    Ok(serde_json::from_value(serde_json::Value::String(
        label.to_string(),
    ))?)
}

impl SqliteAuditLog {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteAuditLog { pool }
    }

    pub async fn append(&self, entry: &AuditLogEntry) -> DbResult<()> {
        let previous = entry
            .previous_value
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let new = entry.new_value.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, entity_type, entity_id, action,
                previous_value, new_value, actor_id, actor_role, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.entity_type.as_str())
        .bind(&entry.entity_id)
        .bind(entry.action.as_str())
        .bind(previous)
        .bind(new)
        .bind(&entry.actor_id)
        .bind(entry.actor_role.as_str())
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;

        debug!(
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            action = %entry.action,
            actor = %entry.actor_id,
            "Audit entry recorded"
        );
        Ok(())
    }

    /// History of one record, oldest first.
    pub async fn entries_for(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> DbResult<Vec<AuditLogEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, entity_type, entity_id, action, previous_value, new_value,
                   actor_id, actor_role, timestamp
            FROM audit_log
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY timestamp ASC, rowid ASC
            "#,
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditRow::into_entry).collect()
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl AuditSink for SqliteAuditLog {
    async fn record(&self, entry: AuditLogEntry) -> CoreResult<()> {
        Ok(self.append(&entry).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::testing;
    use tripdesk_core::audit::AuditAction;
    use tripdesk_core::lifecycle::submit;

    #[tokio::test]
    async fn test_entries_read_back_in_order() {
        let log = Database::new(DbConfig::in_memory()).await.unwrap().audit_log();
        let before = testing::draft_quote();
        let mut after = before.clone();
        submit(&mut after, &testing::agent(), Utc::now()).unwrap();

        let created = AuditLogEntry::snapshot(
            EntityType::Quote,
            &before.id,
            AuditAction::Created,
            None,
            Some(&before),
            &testing::agent(),
            before.created_at,
        )
        .unwrap();
        let submitted = AuditLogEntry::snapshot(
            EntityType::Quote,
            &before.id,
            AuditAction::Submitted,
            Some(&before),
            Some(&after),
            &testing::agent(),
            after.updated_at,
        )
        .unwrap();

        log.record(created).await.unwrap();
        log.record(submitted.clone()).await.unwrap();

        let entries = log.entries_for(EntityType::Quote, &before.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::Created);
        assert!(entries[0].previous_value.is_none());
        assert_eq!(entries[1].id, submitted.id);
        assert_eq!(entries[1].actor_role, Role::Agent);
        assert_eq!(entries[1].new_value, submitted.new_value);
        assert_eq!(log.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_entry_ids_are_write_once() {
        let log = Database::new(DbConfig::in_memory()).await.unwrap().audit_log();
        let quote = testing::draft_quote();
        let entry = AuditLogEntry::snapshot(
            EntityType::Quote,
            &quote.id,
            AuditAction::Created,
            None,
            Some(&quote),
            &testing::agent(),
            Utc::now(),
        )
        .unwrap();

        log.record(entry.clone()).await.unwrap();
        assert!(log.record(entry).await.is_err());
    }
}
