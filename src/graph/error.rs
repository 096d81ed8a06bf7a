//! Error types for graph operations
//!
//! Every failure while turning a list of declared nodes into a runnable graph
//! is reported through [`GraphError`].

use super::NodeId;
use thiserror::Error;

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur while resolving a flow graph
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GraphError {
    /// A node was reached again while its own dependencies were still being resolved
    #[error("circular dependency detected for node '{node}' in flow '{flow}'")]
    CircularDependency {
        /// Flow the node belongs to
        flow: String,
        /// Node that closed the cycle
        node: NodeId,
    },

    /// A dependency references a node that does not exist in the flow
    #[error("dependency '{dependency}' of node '{node}' does not exist in flow '{flow}'")]
    DependencyNotFound {
        /// Flow the node belongs to
        flow: String,
        /// The node that declared the dependency
        node: NodeId,
        /// The dependency that was not found
        dependency: NodeId,
    },

    /// Two nodes of the same flow share an id
    #[error("duplicate node id '{node}' in flow '{flow}'")]
    DuplicateNode {
        /// Flow the node belongs to
        flow: String,
        /// The duplicated id
        node: NodeId,
    },

    /// The flow has no nodes
    #[error("flow '{flow}' has no nodes")]
    EmptyFlow {
        /// The empty flow
        flow: String,
    },
}

impl GraphError {
    /// Creates a circular dependency error
    pub fn circular(flow: impl Into<String>, node: NodeId) -> Self {
        Self::CircularDependency {
            flow: flow.into(),
            node,
        }
    }

    /// Creates a dependency not found error
    pub fn dependency_not_found(flow: impl Into<String>, node: NodeId, dependency: NodeId) -> Self {
        Self::DependencyNotFound {
            flow: flow.into(),
            node,
            dependency,
        }
    }

    /// Creates a duplicate node error
    pub fn duplicate_node(flow: impl Into<String>, node: NodeId) -> Self {
        Self::DuplicateNode {
            flow: flow.into(),
            node,
        }
    }

    /// Creates an empty flow error
    pub fn empty_flow(flow: impl Into<String>) -> Self {
        Self::EmptyFlow { flow: flow.into() }
    }

    /// Returns true for a cycle error
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }
}
