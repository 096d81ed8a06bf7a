//! Reference store shared by the nodes of one invocation.
//!
//! Values are addressed by a resource name (a logical slot such as a node's
//! response or the well-known [`ERROR_RESOURCE`]) and a dotted property path
//! inside it. Any node may write; readers load by exact key.
//!
//! - [`Store`]: the trait the engine, functions and codecs program against
//! - [`ReferenceStore`]: the concurrent in-memory implementation
//!
//! # Example
//!
//! ```
//! use switchyard::store::{Reference, ReferenceStore, Store, ERROR_RESOURCE};
//! use serde_json::json;
//!
//! let store = ReferenceStore::new();
//! store.store(ERROR_RESOURCE, Reference::new("message", json!("boom")));
//!
//! let reference = store.load(ERROR_RESOURCE, "message").unwrap();
//! assert_eq!(reference.value, json!("boom"));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod memory;

pub use memory::ReferenceStore;

/// Resource holding the payload the flow was invoked with
pub const INPUT_RESOURCE: &str = "input";

/// Resource the error codec decodes remote error bodies into
pub const ERROR_RESOURCE: &str = "error";

/// A resolved value at a property path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub path: String,
    pub value: Value,
}

impl Reference {
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }
}

/// Pointer to a value inside the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyReference {
    pub resource: String,
    pub path: String,
}

impl PropertyReference {
    pub fn new(resource: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            path: path.into(),
        }
    }
}

/// A value that is either a literal default or read from the store.
///
/// When the reference is set and present in the store, the stored value wins;
/// otherwise the default is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub reference: Option<PropertyReference>,
}

impl Property {
    /// Creates a property holding a literal value
    pub fn literal(value: Value) -> Self {
        Self {
            default: Some(value),
            reference: None,
        }
    }

    /// Creates a property reading `resource:path` from the store
    pub fn reference(resource: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            default: None,
            reference: Some(PropertyReference::new(resource, path)),
        }
    }

    /// Sets the fallback value used when the reference is absent
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Resolves the property against the store
    pub fn resolve(&self, store: &dyn Store) -> Option<Value> {
        if let Some(reference) = &self.reference {
            if let Some(found) = store.load(&reference.resource, &reference.path) {
                return Some(found.value);
            }
        }

        self.default.clone()
    }
}

/// Concurrent key/value space addressed by (resource, path).
///
/// Implementations must be safe for concurrent reads and writes from every
/// node task of an invocation.
pub trait Store: Send + Sync {
    /// Loads the reference stored at `resource:path`, `None` if absent
    fn load(&self, resource: &str, path: &str) -> Option<Reference>;

    /// Stores the reference under `resource:reference.path`
    fn store(&self, resource: &str, reference: Reference);

    /// Number of stored references
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
