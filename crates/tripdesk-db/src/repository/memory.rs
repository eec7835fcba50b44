//! # In-Memory Stores
//!
//! `HashMap`s behind `tokio::sync::RwLock`, with the same compare-and-swap
//! semantics as the SQLite repositories. Used by engine tests and anywhere a
//! throwaway store is enough.
//!
//! ## Example
//! ```rust,ignore
//! let quotes: Arc<dyn Repository<Quote>> = Arc::new(InMemoryRepository::<Quote>::new());
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tripdesk_core::audit::AuditLogEntry;
use tripdesk_core::ports::{AuditSink, ReceiptSequence, Repository, Versioned};
use tripdesk_core::{CoreError, CoreResult};

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct InMemoryRepository<T> {
    storage: Arc<RwLock<HashMap<String, T>>>,
}

impl<T> InMemoryRepository<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        // try_read keeps this usable from sync code
        self.storage
            .try_read()
            .map(|guard| guard.len())
            .unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Repository<T> for InMemoryRepository<T>
where
    T: Versioned + std::fmt::Debug,
{
    async fn get(&self, id: &str) -> CoreResult<Option<T>> {
        let storage = self.storage.read().await;
        Ok(storage.get(id).cloned())
    }

    async fn save(&self, entity: T, expected_version: u64) -> CoreResult<T> {
        let mut storage = self.storage.write().await;

        let actual = storage
            .get(entity.key())
            .map_or(0, Versioned::record_version);
        if actual != expected_version {
            return Err(CoreError::ConcurrentModification {
                entity: T::ENTITY,
                id: entity.key().to_string(),
                expected: expected_version,
                actual,
            });
        }

        let mut entity = entity;
        entity.set_record_version(expected_version + 1);
        storage.insert(entity.key().to_string(), entity.clone());
        Ok(entity)
    }

    async fn query(&self, predicate: &(dyn for<'a> Fn(&'a T) -> bool + Send + Sync)) -> CoreResult<Vec<T>> {
        let storage = self.storage.read().await;
        Ok(storage.values().filter(|t| predicate(t)).cloned().collect())
    }
}

// =============================================================================
// Audit Sink
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    entries: Arc<RwLock<Vec<AuditLogEntry>>>,
}

impl InMemoryAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, in order.
    pub async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditLog {
    async fn record(&self, entry: AuditLogEntry) -> CoreResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}

// =============================================================================
// Receipt Sequence
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct InMemoryReceiptSequence {
    counters: Arc<RwLock<HashMap<String, u64>>>,
}

impl InMemoryReceiptSequence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReceiptSequence for InMemoryReceiptSequence {
    async fn next(&self, company_id: &str) -> CoreResult<u64> {
        let mut counters = self.counters.write().await;
        let counter = counters.entry(company_id.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use tripdesk_core::Quote;

    #[tokio::test]
    async fn test_cas_matches_sqlite_semantics() {
        let repo = InMemoryRepository::<Quote>::new();
        let quote = testing::draft_quote();

        let stored = repo.save(quote.clone(), 0).await.unwrap();
        assert_eq!(stored.record_version, 1);
        assert_eq!(repo.len(), 1);

        repo.save(stored.clone(), 1).await.unwrap();
        let err = repo.save(stored, 1).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::ConcurrentModification {
                expected: 1,
                actual: 2,
                ..
            }
        ));

        assert!(repo.save(quote, 0).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_sequence_and_audit_log() {
        let seq = InMemoryReceiptSequence::new();
        assert_eq!(seq.next("TD").await.unwrap(), 1);
        assert_eq!(seq.next("TD").await.unwrap(), 2);
        assert_eq!(seq.next("XY").await.unwrap(), 1);

        let log = InMemoryAuditLog::new();
        assert!(log.entries().await.is_empty());
    }
}
