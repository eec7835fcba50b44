//! # Receipt Sequences
//!
//! One counter per company. `next` is a single upsert, so two concurrent
//! callers can never receive the same number.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;
use tripdesk_core::ports::ReceiptSequence;
use tripdesk_core::CoreResult;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct SqliteReceiptSequence {
    pool: SqlitePool,
}

impl SqliteReceiptSequence {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteReceiptSequence { pool }
    }

    pub async fn advance(&self, company_id: &str) -> DbResult<u64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO receipt_sequences (company_id, last_value) VALUES (?1, 1)
            ON CONFLICT(company_id) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(company_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(company_id = %company_id, value, "Receipt sequence advanced");
        Ok(value.max(0) as u64)
    }

    /// Last issued value, 0 if none yet.
    pub async fn current(&self, company_id: &str) -> DbResult<u64> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT last_value FROM receipt_sequences WHERE company_id = ?1")
                .bind(company_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.map_or(0, |v| v.max(0) as u64))
    }
}

#[async_trait]
impl ReceiptSequence for SqliteReceiptSequence {
    async fn next(&self, company_id: &str) -> CoreResult<u64> {
        Ok(self.advance(company_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_counters_are_per_company() {
        let seq = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .receipt_sequences();

        assert_eq!(seq.current("TD").await.unwrap(), 0);
        assert_eq!(seq.next("TD").await.unwrap(), 1);
        assert_eq!(seq.next("TD").await.unwrap(), 2);
        assert_eq!(seq.next("GOA").await.unwrap(), 1);
        assert_eq!(seq.current("TD").await.unwrap(), 2);
    }
}
