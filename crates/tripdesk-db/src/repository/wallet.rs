//! # Agent Wallet Repository
//!
//! One row per agent, keyed by `agent_id`. The transaction history rides in
//! the payload.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;
use tripdesk_core::ports::Repository;
use tripdesk_core::wallet::AgentWallet;
use tripdesk_core::CoreResult;

use super::document::{self, Table};
use crate::error::DbResult;

const TABLE: Table = Table {
    name: "agent_wallets",
    key_column: "agent_id",
    order_by: "agent_id ASC",
};

#[derive(Debug, Clone)]
pub struct SqliteWalletRepository {
    pool: SqlitePool,
}

impl SqliteWalletRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteWalletRepository { pool }
    }

    pub async fn find(&self, agent_id: &str) -> DbResult<Option<AgentWallet>> {
        document::fetch_payload(&self.pool, &TABLE, agent_id)
            .await?
            .map(|payload| document::decode(&payload))
            .transpose()
    }

    pub async fn store(&self, wallet: AgentWallet, expected: u64) -> DbResult<AgentWallet> {
        let wallet = document::stamp(wallet, expected);
        let payload = document::encode(&wallet)?;
        let new_version = document::sql_version(wallet.record_version);

        let result = if expected == 0 {
            sqlx::query(
                r#"
                INSERT INTO agent_wallets (agent_id, currency, record_version, payload, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(agent_id) DO NOTHING
                "#,
            )
            .bind(&wallet.agent_id)
            .bind(&wallet.currency)
            .bind(new_version)
            .bind(&payload)
            .bind(wallet.updated_at)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE agent_wallets SET
                    currency = ?2,
                    record_version = ?3,
                    payload = ?4,
                    updated_at = ?5
                WHERE agent_id = ?1 AND record_version = ?6
                "#,
            )
            .bind(&wallet.agent_id)
            .bind(&wallet.currency)
            .bind(new_version)
            .bind(&payload)
            .bind(wallet.updated_at)
            .bind(document::sql_version(expected))
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(document::rejected_write::<AgentWallet>(
                &self.pool,
                &TABLE,
                &wallet.agent_id,
                expected,
            )
            .await);
        }

        debug!(
            agent_id = %wallet.agent_id,
            balance = %wallet.balance,
            record_version = wallet.record_version,
            "Wallet stored"
        );
        Ok(wallet)
    }

    pub async fn all(&self) -> DbResult<Vec<AgentWallet>> {
        document::fetch_all(&self.pool, &TABLE).await
    }
}

#[async_trait]
impl Repository<AgentWallet> for SqliteWalletRepository {
    async fn get(&self, id: &str) -> CoreResult<Option<AgentWallet>> {
        Ok(self.find(id).await?)
    }

    async fn save(&self, entity: AgentWallet, expected_version: u64) -> CoreResult<AgentWallet> {
        Ok(self.store(entity, expected_version).await?)
    }

    async fn query(
        &self,
        predicate: &(dyn for<'a> Fn(&'a AgentWallet) -> bool + Send + Sync),
    ) -> CoreResult<Vec<AgentWallet>> {
        let wallets = self.all().await?;
        Ok(wallets.into_iter().filter(|w| predicate(w)).collect())
    }
}
