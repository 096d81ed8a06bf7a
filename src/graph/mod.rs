//! Dependency graph of a flow
//!
//! This module turns declared node dependencies into a resolved graph:
//!
//! - Dependencies are declared by id and resolved to arena indices
//! - Self dependencies are pruned
//! - Cycles and unknown ids are rejected with a [`GraphError`]
//!
//! Execution state never lives here. The graph is built once per flow and
//! shared by every invocation; per-invocation state is tracked by the executor.

mod error;
mod manifest;
mod node_id;
mod resolver;

pub use error::{GraphError, GraphResult};
pub use manifest::{resolve_manifest, FlowSpec, Manifest, NodeSpec};
pub use node_id::{NodeId, NodeIndex};
pub use resolver::{is_resolved, resolve, DependsOn, Dependent};
