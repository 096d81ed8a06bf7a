//! Node identifier type
//!
//! A node is addressed by the id it was declared with in the flow definition.
//! Dependencies are declared by id and resolved to arena indices once, when the
//! flow is constructed.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Index of a node inside the arena owned by a [`Flow`](crate::executor::Flow).
pub type NodeIndex = usize;

/// Unique identifier for a node within a flow
///
/// # Examples
///
/// ```
/// use switchyard::NodeId;
///
/// let node = NodeId::new("fetch_user");
/// assert_eq!(node.as_str(), "fetch_user");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a new node id
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
