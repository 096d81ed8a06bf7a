//! Switchyard: concurrent flow execution for service orchestration
//!
//! `switchyard` composes calls to independent services into directed flows:
//! graphs of nodes with data dependencies, conditional branching and automatic
//! rollback on failure. A node runs once all of its dependencies completed,
//! independent nodes run concurrently, and a failed flow reverts every node
//! that completed, walking the graph backward.
//!
//! # Features
//!
//! - **Dependency resolution**: nodes declare dependencies by id; cycles and
//!   unknown ids are rejected when the flow is built
//! - **Fan-in barriers**: diamond shaped graphs execute every node exactly once
//! - **Conditions**: nodes are gated on values in the reference store, and
//!   skips propagate to dependents
//! - **Call orchestration**: status validation, error decoding and function
//!   stacks around a pluggable transport
//! - **Rollback**: best-effort reverts in reverse dependency order
//!
//! # Quick Start
//!
//! ```
//! use switchyard::prelude::*;
//!
//! struct Reserve;
//!
//! #[async_trait]
//! impl Call for Reserve {
//!     async fn call(&self, _cancel: &CancellationToken, store: &dyn Store) -> CallResult {
//!         store.store("reservation", Reference::new("id", serde_json::json!("r-1")));
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let flow = Flow::new(
//!         "checkout",
//!         vec![
//!             Node::new("reserve").with_call(Reserve),
//!             Node::new("charge")
//!                 .depends_on(["reserve"])
//!                 .with_call(Caller::new("charge", CallerOptions::default())),
//!         ],
//!     )?;
//!
//!     let store = Arc::new(ReferenceStore::new());
//!     flow.invoke(store.clone()).await?;
//!
//!     assert!(store.load("reservation", "id").is_some());
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! Each module hides one design decision that is likely to change:
//!
//! - [`graph`]: dependency declaration and resolution (hides how ids become
//!   arena indices)
//! - [`store`]: the reference store (hides the concurrent map)
//! - [`core`]: function stacks and the expression contract
//! - [`codec`]: body encoding (hides the wire format)
//! - [`transport`]: the transport contract (hides the network)
//! - [`executor`]: the execution engine (hides the scheduling strategy)
//!
//! The library emits `tracing` events but never installs a subscriber.

pub mod codec;
pub mod core;
pub mod executor;
pub mod graph;
pub mod store;
pub mod transport;

pub use core::{BoxError, Expression, Function, FunctionError, Params, Stack};

pub use executor::{
    Call, CallError, CallResult, Caller, CallerOptions, Condition, ConditionError, ErrorHandle,
    Flow, FlowError, FlowMiddleware, HookPhase, Node, NodeFailure, NodeMiddleware, Payload,
    Processes, Tracker,
};

pub use graph::{GraphError, GraphResult, NodeId, NodeIndex};

pub use store::{Property, Reference, ReferenceStore, Store};

// Re-export dependencies used in the public API
pub use async_trait::async_trait;
pub use serde_json;
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient glob imports
///
/// # Example
///
/// ```
/// use switchyard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{BoxError, Expression, Params, Stack};

    pub use crate::executor::{
        Call, CallError, CallResult, Caller, CallerOptions, Condition, ErrorHandle, Flow,
        FlowError, FlowMiddleware, HookPhase, Node, NodeFailure, NodeMiddleware, Payload,
    };

    pub use crate::graph::{GraphError, NodeId};

    pub use crate::store::{Property, Reference, ReferenceStore, Store};

    pub use crate::transport::{Request, ResponseWriter, Transport, TransportError};

    pub use async_trait::async_trait;
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
}
