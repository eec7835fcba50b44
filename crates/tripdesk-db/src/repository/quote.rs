//! # Quote Repository
//!
//! Every revision of a quote is its own row; revisions share
//! `unique_ref_no` and differ by `version`.
//!
//! ```text
//! unique_ref_no        version  status     is_locked  record_version
//! QT-20260301-4F2A91   1        APPROVED   1          4
//! QT-20260301-4F2A91   2        DRAFT      0          1
//! ```

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;
use tripdesk_core::ports::{Repository, Versioned};
use tripdesk_core::{CoreResult, Quote, QuoteStatus};

use super::document::{self, Table};
use crate::error::DbResult;

const TABLE: Table = Table {
    name: "quotes",
    key_column: "id",
    order_by: "created_at ASC, id ASC",
};

#[derive(Debug, Clone)]
pub struct SqliteQuoteRepository {
    pool: SqlitePool,
}

impl SqliteQuoteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteQuoteRepository { pool }
    }

    pub async fn find(&self, id: &str) -> DbResult<Option<Quote>> {
        document::fetch_payload(&self.pool, &TABLE, id)
            .await?
            .map(|payload| document::decode(&payload))
            .transpose()
    }

    /// Inserts (`expected == 0`) or compare-and-swaps the quote.
    pub async fn store(&self, quote: Quote, expected: u64) -> DbResult<Quote> {
        let quote = document::stamp(quote, expected);
        let payload = document::encode(&quote)?;
        let new_version = document::sql_version(quote.record_version);

        let result = if expected == 0 {
            sqlx::query(
                r#"
                INSERT INTO quotes (
                    id, unique_ref_no, version, status, agent_id, is_locked,
                    record_version, payload, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(&quote.id)
            .bind(&quote.unique_ref_no)
            .bind(i64::from(quote.version))
            .bind(quote.status)
            .bind(&quote.agent_id)
            .bind(quote.is_locked)
            .bind(new_version)
            .bind(&payload)
            .bind(quote.created_at)
            .bind(quote.updated_at)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE quotes SET
                    status = ?2,
                    agent_id = ?3,
                    is_locked = ?4,
                    record_version = ?5,
                    payload = ?6,
                    updated_at = ?7
                WHERE id = ?1 AND record_version = ?8
                "#,
            )
            .bind(&quote.id)
            .bind(quote.status)
            .bind(&quote.agent_id)
            .bind(quote.is_locked)
            .bind(new_version)
            .bind(&payload)
            .bind(quote.updated_at)
            .bind(document::sql_version(expected))
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(
                document::rejected_write::<Quote>(&self.pool, &TABLE, &quote.id, expected).await,
            );
        }

        debug!(
            id = %quote.id,
            status = %quote.status,
            record_version = quote.record_version,
            "Quote stored"
        );
        Ok(quote)
    }

    pub async fn all(&self) -> DbResult<Vec<Quote>> {
        document::fetch_all(&self.pool, &TABLE).await
    }

    /// All revisions sharing a reference number, oldest version first.
    pub async fn find_by_reference(&self, unique_ref_no: &str) -> DbResult<Vec<Quote>> {
        let payloads: Vec<String> = sqlx::query_scalar(
            "SELECT payload FROM quotes WHERE unique_ref_no = ?1 ORDER BY version ASC",
        )
        .bind(unique_ref_no)
        .fetch_all(&self.pool)
        .await?;
        payloads.iter().map(|p| document::decode(p)).collect()
    }

    pub async fn count_by_status(&self, status: QuoteStatus) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quotes WHERE status = ?1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl Repository<Quote> for SqliteQuoteRepository {
    async fn get(&self, id: &str) -> CoreResult<Option<Quote>> {
        Ok(self.find(id).await?)
    }

    async fn save(&self, entity: Quote, expected_version: u64) -> CoreResult<Quote> {
        Ok(self.store(entity, expected_version).await?)
    }

    async fn query(&self, predicate: &(dyn for<'a> Fn(&'a Quote) -> bool + Send + Sync)) -> CoreResult<Vec<Quote>> {
        let quotes = self.all().await?;
        Ok(quotes.into_iter().filter(|q| predicate(q)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::testing;
    use chrono::Utc;
    use tripdesk_core::lifecycle::{create_revision, submit};
    use tripdesk_core::CoreError;

    async fn repo() -> SqliteQuoteRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().quotes()
    }

    #[tokio::test]
    async fn test_insert_then_get_round_trips_payload() {
        let repo = repo().await;
        let quote = testing::draft_quote();

        let stored = repo.save(quote.clone(), 0).await.unwrap();
        assert_eq!(stored.record_version, 1);

        let loaded = repo.get(&quote.id).await.unwrap().unwrap();
        assert_eq!(loaded, stored);
        assert_eq!(loaded.selling_price, quote.selling_price);
    }

    #[tokio::test]
    async fn test_second_save_at_same_version_conflicts() {
        let repo = repo().await;
        let stored = repo.save(testing::draft_quote(), 0).await.unwrap();

        let mut first = stored.clone();
        submit(&mut first, &testing::agent(), Utc::now()).unwrap();
        let first = repo.save(first, stored.record_version).await.unwrap();
        assert_eq!(first.record_version, 2);

        let mut second = stored.clone();
        second.title = "Stale edit".to_string();
        let err = repo.save(second, stored.record_version).await.unwrap_err();
        match err {
            CoreError::ConcurrentModification {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {other}"),
        }

        let current = repo.get(&stored.id).await.unwrap().unwrap();
        assert_eq!(current.status, QuoteStatus::Submitted);
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let repo = repo().await;
        let quote = testing::draft_quote();
        repo.save(quote.clone(), 0).await.unwrap();

        let err = repo.save(quote, 0).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_update_of_missing_row_conflicts_with_zero() {
        let repo = repo().await;
        let err = repo.save(testing::draft_quote(), 3).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::ConcurrentModification { actual: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_revisions_share_reference() {
        let repo = repo().await;
        let parent = repo.save(testing::approved_quote(), 0).await.unwrap();
        let revision = create_revision(&parent, &testing::staff(), Utc::now()).unwrap();
        repo.save(revision, 0).await.unwrap();

        let lineage = repo.find_by_reference(&parent.unique_ref_no).await.unwrap();
        assert_eq!(lineage.len(), 2);
        assert_eq!(lineage[0].version, 1);
        assert_eq!(lineage[1].version, 2);
        assert_eq!(repo.count_by_status(QuoteStatus::Draft).await.unwrap(), 1);

        let locked = repo.query(&|q: &Quote| q.is_locked).await.unwrap();
        assert_eq!(locked.len(), 1);
    }
}
