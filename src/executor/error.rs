//! Executor errors
//!
//! Failures are layered: a [`CallError`] or [`ConditionError`] is raised inside
//! a node, wrapped in a [`NodeFailure`], and surfaced to the invoker as a
//! [`FlowError`] carrying the node id and its [`ErrorHandle`]. Only the first
//! fatal error of an invocation is kept.

use super::tracker::Pass;
use crate::codec::CodecError;
use crate::core::{BoxError, FunctionError};
use crate::graph::NodeId;
use crate::store::{Property, Store};
use crate::transport::{TransportError, STATUS_INTERNAL_ERR};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type of a single call
pub type CallResult = std::result::Result<(), CallError>;

/// Errors returned by a node's unit of work.
///
/// Every variant aborts the flow. [`CallError::AbortFlow`] is the distinguished
/// variant for a remote that answered with an unexpected status code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CallError {
    /// A request or response function failed
    #[error("call function failed")]
    Function(#[source] FunctionError),

    /// The request body could not be encoded
    #[error("request encoding failed")]
    Encode(#[source] CodecError),

    /// The response body could not be decoded
    #[error("response decoding failed")]
    Decode(#[source] CodecError),

    /// The transport could not complete the exchange
    #[error("transport failed")]
    Transport(#[source] TransportError),

    /// The remote answered with a status code outside the expected set
    #[error("flow aborted: unexpected status code {status}")]
    AbortFlow { status: i32 },
}

impl CallError {
    pub fn is_abort_flow(&self) -> bool {
        matches!(self, Self::AbortFlow { .. })
    }
}

/// Errors raised while evaluating a condition
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConditionError {
    #[error("condition function failed")]
    Function(#[from] FunctionError),

    #[error("expression evaluation failed")]
    Expression(#[source] BoxError),
}

/// Lifecycle phase a middleware hook runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    BeforeDo,
    AfterDo,
    BeforeRollback,
    AfterRollback,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookPhase::BeforeDo => "before do",
            HookPhase::AfterDo => "after do",
            HookPhase::BeforeRollback => "before rollback",
            HookPhase::AfterRollback => "after rollback",
        };
        f.write_str(name)
    }
}

/// What went wrong inside a node
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NodeFailure {
    #[error("condition evaluation failed")]
    Condition(#[source] ConditionError),

    #[error("call failed")]
    Call(#[source] CallError),

    #[error("{phase} hook failed")]
    Hook {
        phase: HookPhase,
        #[source]
        source: BoxError,
    },

    /// A call, condition or hook panicked while the node was running
    #[error("{pass} step panicked: {message}")]
    Panicked { pass: Pass, message: String },
}

/// Status code and message an upstream caller reports for a failed node.
///
/// Both are [`Property`]s so they can be literals or values decoded into the
/// store by the error codec, e.g. `error:message`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorHandle {
    #[serde(default)]
    pub status: Option<Property>,
    #[serde(default)]
    pub message: Option<Property>,
}

impl ErrorHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: Property) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_message(mut self, message: Property) -> Self {
        self.message = Some(message);
        self
    }

    /// Resolves the status code; only integer values qualify
    pub fn resolve_status(&self, store: &dyn Store) -> Option<i64> {
        self.status
            .as_ref()
            .and_then(|property| property.resolve(store))
            .and_then(|value| value.as_i64())
    }

    /// Resolves the message; non-string values are rendered as JSON
    pub fn resolve_message(&self, store: &dyn Store) -> Option<String> {
        self.message
            .as_ref()
            .and_then(|property| property.resolve(store))
            .map(|value| match value {
                Value::String(message) => message,
                other => other.to_string(),
            })
    }
}

/// The first fatal error of an invocation
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowError {
    /// A node failed; carries the node's error handle
    #[error("node '{node}': {source}")]
    Node {
        node: NodeId,
        #[source]
        source: NodeFailure,
        on_error: Option<Arc<ErrorHandle>>,
    },

    /// A flow level hook failed
    #[error("flow '{flow}': {phase} hook failed")]
    Hook {
        flow: String,
        phase: HookPhase,
        #[source]
        source: BoxError,
    },
}

impl FlowError {
    /// Returns the node that failed, if a node failed
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            FlowError::Node { node, .. } => Some(node),
            FlowError::Hook { .. } => None,
        }
    }

    /// Returns true if a remote answered with an unexpected status code
    pub fn is_abort_flow(&self) -> bool {
        matches!(
            self,
            FlowError::Node {
                source: NodeFailure::Call(CallError::AbortFlow { .. }),
                ..
            }
        )
    }

    /// Status code to report upstream; falls back to [`STATUS_INTERNAL_ERR`]
    pub fn status(&self, store: &dyn Store) -> i64 {
        self.handle()
            .and_then(|handle| handle.resolve_status(store))
            .unwrap_or(i64::from(STATUS_INTERNAL_ERR))
    }

    /// Message to report upstream; falls back to the error's display
    pub fn message(&self, store: &dyn Store) -> String {
        self.handle()
            .and_then(|handle| handle.resolve_message(store))
            .unwrap_or_else(|| self.to_string())
    }

    fn handle(&self) -> Option<&ErrorHandle> {
        match self {
            FlowError::Node { on_error, .. } => on_error.as_deref(),
            FlowError::Hook { .. } => None,
        }
    }
}
