//! Process-scoped document store.
//!
//! Sessions and orders live behind this interface so the in-memory backend
//! can be swapped for a persistent one without touching engine logic.
//! Writers use `compare_and_swap` with the version they read to detect
//! lost updates.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

/// A stored value together with its monotonically increasing version.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

#[async_trait]
pub trait DocumentStore<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, id: &str) -> Option<Versioned<T>>;

    /// Insert or unconditionally overwrite, bumping the version.
    async fn put(&self, id: &str, value: T) -> Versioned<T>;

    /// Replace the document only if its current version matches `expected`.
    /// Returns `false` (and leaves the document untouched) on a version miss.
    async fn compare_and_swap(&self, id: &str, expected: u64, value: T) -> bool;
}

pub struct InMemoryDocumentStore<T> {
    inner: Mutex<HashMap<String, Versioned<T>>>,
}

impl<T> InMemoryDocumentStore<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Default for InMemoryDocumentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> DocumentStore<T> for InMemoryDocumentStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, id: &str) -> Option<Versioned<T>> {
        self.inner.lock().await.get(id).cloned()
    }

    async fn put(&self, id: &str, value: T) -> Versioned<T> {
        let mut inner = self.inner.lock().await;
        let version = inner.get(id).map(|v| v.version + 1).unwrap_or(1);
        let entry = Versioned { version, value };
        inner.insert(id.to_string(), entry.clone());
        entry
    }

    async fn compare_and_swap(&self, id: &str, expected: u64, value: T) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.get(id) {
            Some(current) if current.version == expected => {
                inner.insert(
                    id.to_string(),
                    Versioned {
                        version: expected + 1,
                        value,
                    },
                );
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_bumps_version() {
        let store = InMemoryDocumentStore::new();
        let v1 = store.put("a", 1u32).await;
        let v2 = store.put("a", 2u32).await;
        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);
        assert_eq!(store.get("a").await.unwrap().value, 2);
    }

    #[tokio::test]
    async fn test_cas_rejects_stale_version() {
        let store = InMemoryDocumentStore::new();
        store.put("a", 1u32).await;

        assert!(store.compare_and_swap("a", 1, 2).await);
        // Stale writer loses; value stays at the winner's.
        assert!(!store.compare_and_swap("a", 1, 99).await);
        assert_eq!(store.get("a").await.unwrap().value, 2);
        assert_eq!(store.get("a").await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_cas_on_missing_document_fails() {
        let store: InMemoryDocumentStore<u32> = InMemoryDocumentStore::new();
        assert!(!store.compare_and_swap("ghost", 0, 1).await);
    }
}
