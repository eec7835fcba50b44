//! # Booking Repository

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;
use tripdesk_core::ports::Repository;
use tripdesk_core::{Booking, BookingStatus, CoreResult};

use super::document::{self, Table};
use crate::error::DbResult;

const TABLE: Table = Table {
    name: "bookings",
    key_column: "id",
    order_by: "created_at ASC, id ASC",
};

#[derive(Debug, Clone)]
pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteBookingRepository { pool }
    }

    pub async fn find(&self, id: &str) -> DbResult<Option<Booking>> {
        document::fetch_payload(&self.pool, &TABLE, id)
            .await?
            .map(|payload| document::decode(&payload))
            .transpose()
    }

    /// Inserts (`expected == 0`) or compare-and-swaps the booking. The
    /// source quote row must already exist.
    pub async fn store(&self, booking: Booking, expected: u64) -> DbResult<Booking> {
        let booking = document::stamp(booking, expected);
        let payload = document::encode(&booking)?;
        let new_version = document::sql_version(booking.record_version);

        let result = if expected == 0 {
            sqlx::query(
                r#"
                INSERT INTO bookings (
                    id, quote_id, unique_ref_no, status, agent_id,
                    record_version, payload, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(&booking.id)
            .bind(&booking.quote_id)
            .bind(&booking.unique_ref_no)
            .bind(booking.status)
            .bind(&booking.agent_id)
            .bind(new_version)
            .bind(&payload)
            .bind(booking.created_at)
            .bind(booking.updated_at)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE bookings SET
                    status = ?2,
                    record_version = ?3,
                    payload = ?4,
                    updated_at = ?5
                WHERE id = ?1 AND record_version = ?6
                "#,
            )
            .bind(&booking.id)
            .bind(booking.status)
            .bind(new_version)
            .bind(&payload)
            .bind(booking.updated_at)
            .bind(document::sql_version(expected))
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(
                document::rejected_write::<Booking>(&self.pool, &TABLE, &booking.id, expected)
                    .await,
            );
        }

        debug!(
            id = %booking.id,
            status = %booking.status,
            paid = %booking.paid_amount,
            record_version = booking.record_version,
            "Booking stored"
        );
        Ok(booking)
    }

    pub async fn all(&self) -> DbResult<Vec<Booking>> {
        document::fetch_all(&self.pool, &TABLE).await
    }

    pub async fn find_by_quote(&self, quote_id: &str) -> DbResult<Vec<Booking>> {
        let payloads: Vec<String> = sqlx::query_scalar(
            "SELECT payload FROM bookings WHERE quote_id = ?1 ORDER BY created_at ASC",
        )
        .bind(quote_id)
        .fetch_all(&self.pool)
        .await?;
        payloads.iter().map(|p| document::decode(p)).collect()
    }

    pub async fn count_by_status(&self, status: BookingStatus) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE status = ?1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl Repository<Booking> for SqliteBookingRepository {
    async fn get(&self, id: &str) -> CoreResult<Option<Booking>> {
        Ok(self.find(id).await?)
    }

    async fn save(&self, entity: Booking, expected_version: u64) -> CoreResult<Booking> {
        Ok(self.store(entity, expected_version).await?)
    }

    async fn query(
        &self,
        predicate: &(dyn for<'a> Fn(&'a Booking) -> bool + Send + Sync),
    ) -> CoreResult<Vec<Booking>> {
        let bookings = self.all().await?;
        Ok(bookings.into_iter().filter(|b| predicate(b)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::testing;
    use chrono::Utc;
    use tripdesk_core::booking::{confirm, record_payment, NewPayment};
    use tripdesk_core::{Money, PaymentMode, PaymentType};

    async fn seeded() -> (Database, Booking) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut quote = testing::approved_quote();
        let booking = testing::booking_for(&mut quote);
        db.quotes().store(quote, 0).await.unwrap();
        let booking = db.bookings().store(booking, 0).await.unwrap();
        (db, booking)
    }

    #[tokio::test]
    async fn test_ledger_survives_round_trip() {
        let (db, mut booking) = seeded().await;
        let repo = db.bookings();

        confirm(&mut booking, &testing::staff(), Utc::now()).unwrap();
        let payment = NewPayment {
            id: "pay-1".to_string(),
            amount: booking.advance_amount,
            payment_type: PaymentType::Advance,
            mode: PaymentMode::BankTransfer,
            reference: Some("NEFT-001".to_string()),
        };
        record_payment(
            &mut booking,
            payment,
            "RCPT-TD-000001".to_string(),
            &testing::staff(),
            Utc::now(),
        )
        .unwrap();
        let expected = booking.record_version;
        repo.save(booking.clone(), expected).await.unwrap();

        let loaded = repo.get(&booking.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, BookingStatus::Confirmed);
        assert_eq!(loaded.payments.len(), 1);
        assert_eq!(loaded.paid_amount, booking.advance_amount);
        assert_eq!(loaded.balance_amount, booking.total_amount - booking.advance_amount);
        assert_eq!(loaded.record_version, 2);
        assert_eq!(repo.count_by_status(BookingStatus::Confirmed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stale_booking_write_is_rejected() {
        let (db, booking) = seeded().await;
        let repo = db.bookings();

        let mut fresh = booking.clone();
        confirm(&mut fresh, &testing::staff(), Utc::now()).unwrap();
        repo.save(fresh, 1).await.unwrap();

        let err = repo.save(booking.clone(), 1).await.unwrap_err();
        assert!(err.is_conflict());
        let current = repo.get(&booking.id).await.unwrap().unwrap();
        assert_eq!(current.status, BookingStatus::Confirmed);
        assert!(current.paid_amount == Money::zero());
    }

    #[tokio::test]
    async fn test_find_by_quote() {
        let (db, booking) = seeded().await;
        let found = db.bookings().find_by_quote(&booking.quote_id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, booking.id);
    }

    #[tokio::test]
    async fn test_booking_requires_stored_quote() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut quote = testing::approved_quote();
        let booking = testing::booking_for(&mut quote);

        assert!(db.bookings().store(booking, 0).await.is_err());
    }
}
