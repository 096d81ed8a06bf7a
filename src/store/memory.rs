use super::{Reference, Store};
use dashmap::DashMap;

/// In-memory reference store using DashMap for concurrent access.
///
/// DashMap shards its buckets, so concurrent node tasks writing distinct
/// resources do not contend on a single lock.
#[derive(Debug, Default)]
pub struct ReferenceStore {
    references: DashMap<(String, String), Reference>,
}

impl ReferenceStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            references: DashMap::new(),
        }
    }

    /// Creates an empty store sized for `capacity` references
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            references: DashMap::with_capacity(capacity),
        }
    }

    /// Returns every reference stored under `resource`, sorted by path
    pub fn resource(&self, resource: &str) -> Vec<Reference> {
        let mut references: Vec<Reference> = self
            .references
            .iter()
            .filter(|entry| entry.key().0 == resource)
            .map(|entry| entry.value().clone())
            .collect();

        references.sort_by(|a, b| a.path.cmp(&b.path));
        references
    }
}

fn key(resource: &str, path: &str) -> (String, String) {
    (resource.to_string(), path.to_string())
}

impl Store for ReferenceStore {
    fn load(&self, resource: &str, path: &str) -> Option<Reference> {
        self.references
            .get(&key(resource, path))
            .map(|entry| entry.value().clone())
    }

    fn store(&self, resource: &str, reference: Reference) {
        self.references
            .insert(key(resource, &reference.path), reference);
    }

    fn len(&self) -> usize {
        self.references.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_load_missing() {
        let store = ReferenceStore::new();
        assert!(store.load("input", "name").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_resource_listing() {
        let store = ReferenceStore::with_capacity(4);
        store.store("error", Reference::new("status", json!(500)));
        store.store("error", Reference::new("message", json!("boom")));
        store.store("errors", Reference::new("other", json!(1)));

        let references = store.resource("error");
        assert_eq!(references.len(), 2);
        assert_eq!(references[0].path, "message");
        assert_eq!(references[1].path, "status");
    }

    #[test]
    fn test_keys_do_not_collide_across_separators() {
        let store = ReferenceStore::new();
        store.store("a:b", Reference::new("c", json!("left")));
        store.store("a", Reference::new("b:c", json!("right")));

        assert_eq!(store.len(), 2);
        assert_eq!(store.load("a:b", "c").unwrap().value, json!("left"));
        assert_eq!(store.load("a", "b:c").unwrap().value, json!("right"));
        assert_eq!(store.resource("a").len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writes() {
        let store = Arc::new(ReferenceStore::new());
        let mut handles = Vec::new();

        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.store(&format!("node{i}"), Reference::new("value", json!(i)));
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 16);
        assert_eq!(store.load("node7", "value").unwrap().value, json!(7));
    }
}
