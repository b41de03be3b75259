//! Resolving a check id to its [`Check`] record.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::check::Check;
use crate::error::LookupError;

/// Read access to the host's check records.
#[async_trait]
pub trait CheckLookup: Send + Sync {
    async fn lookup_check(&self, check_id: &str) -> Result<Check, LookupError>;
}

#[async_trait]
impl<T: CheckLookup + ?Sized> CheckLookup for Arc<T> {
    async fn lookup_check(&self, check_id: &str) -> Result<Check, LookupError> {
        (**self).lookup_check(check_id).await
    }
}

/// In-process check store, for embedding the relay inside a host.
#[derive(Debug, Default)]
pub struct MemoryCheckStore {
    checks: RwLock<HashMap<String, Check>>,
}

impl MemoryCheckStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_checks(checks: impl IntoIterator<Item = Check>) -> Self {
        Self {
            checks: RwLock::new(checks.into_iter().map(|c| (c.id.clone(), c)).collect()),
        }
    }

    /// Insert or replace a check, keyed by its id.
    pub async fn upsert(&self, check: Check) {
        self.checks.write().await.insert(check.id.clone(), check);
    }

    pub async fn remove(&self, check_id: &str) -> Option<Check> {
        self.checks.write().await.remove(check_id)
    }

    pub async fn len(&self) -> usize {
        self.checks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checks.read().await.is_empty()
    }
}

#[async_trait]
impl CheckLookup for MemoryCheckStore {
    async fn lookup_check(&self, check_id: &str) -> Result<Check, LookupError> {
        self.checks
            .read()
            .await
            .get(check_id)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(check_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_known_check() {
        let store = MemoryCheckStore::from_checks([Check::new("abc", "FooBar", "http://foobar.com")]);
        let check = store.lookup_check("abc").await.unwrap();
        assert_eq!(check.name, "FooBar");
    }

    #[tokio::test]
    async fn lookup_unknown_check() {
        let store = MemoryCheckStore::new();
        match store.lookup_check("nope").await {
            Err(LookupError::NotFound(id)) => assert_eq!(id, "nope"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn upsert_replaces_and_remove_deletes() {
        let store = MemoryCheckStore::new();
        store.upsert(Check::new("abc", "Old", "http://a")).await;
        store.upsert(Check::new("abc", "New", "http://a")).await;
        assert_eq!(store.len().await, 1);
        assert_eq!(store.lookup_check("abc").await.unwrap().name, "New");

        assert!(store.remove("abc").await.is_some());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn shared_store_through_arc() {
        let store = Arc::new(MemoryCheckStore::from_checks([Check::new("x", "X", "http://x")]));
        let lookup: Arc<dyn CheckLookup> = store.clone();
        assert_eq!(lookup.lookup_check("x").await.unwrap().id, "x");
    }
}
