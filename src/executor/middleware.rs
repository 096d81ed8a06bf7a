//! Lifecycle hooks
//!
//! Hooks run around both passes at node and flow level. Every hook defaults to
//! a no-op, so implementors override only the phases they care about. A hook
//! error is fatal to the invocation, except where noted on [`super::Flow`].

use super::flow::Flow;
use super::node::Node;
use crate::core::BoxError;
use crate::store::Store;
use async_trait::async_trait;

/// Hooks run around a single node
#[async_trait]
pub trait NodeMiddleware: Send + Sync {
    /// Runs after the condition passed, before the call
    async fn before_do(&self, _node: &Node, _store: &dyn Store) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs after successors were scheduled
    async fn after_do(&self, _node: &Node, _store: &dyn Store) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs before the revert; an error stops the rollback through this node
    async fn before_rollback(&self, _node: &Node, _store: &dyn Store) -> Result<(), BoxError> {
        Ok(())
    }

    async fn after_rollback(&self, _node: &Node, _store: &dyn Store) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Hooks run around a whole invocation
#[async_trait]
pub trait FlowMiddleware: Send + Sync {
    async fn before_do(&self, _flow: &Flow, _store: &dyn Store) -> Result<(), BoxError> {
        Ok(())
    }

    async fn after_do(&self, _flow: &Flow, _store: &dyn Store) -> Result<(), BoxError> {
        Ok(())
    }

    async fn before_rollback(&self, _flow: &Flow, _store: &dyn Store) -> Result<(), BoxError> {
        Ok(())
    }

    async fn after_rollback(&self, _flow: &Flow, _store: &dyn Store) -> Result<(), BoxError> {
        Ok(())
    }
}
