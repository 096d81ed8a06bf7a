//! Flow execution engine
//!
//! This module hides **"how a flow graph is walked concurrently"**. Callers
//! build a [`Flow`] from [`Node`]s and invoke it; everything else is internal
//! to one invocation:
//!
//! - [`Tracker`]: per node ledgers and the fan-in barrier
//! - [`Processes`]: pending work counter and first fatal error
//! - [`Caller`]: the default unit of work of a node
//! - [`Condition`]: gates a node on values in the store
//!
//! Forward execution starts at the roots. When a node fails, sibling tasks
//! finish what they started but schedule nothing new, and the flow walks
//! backward from the sinks reverting every node that completed.

use std::sync::{Mutex, MutexGuard, PoisonError};

mod call;
mod condition;
mod error;
mod flow;
mod middleware;
mod node;
mod processes;
mod tracker;

pub use call::{Call, Caller, CallerOptions, Payload};
pub use condition::Condition;
pub use error::{
    CallError, CallResult, ConditionError, ErrorHandle, FlowError, HookPhase, NodeFailure,
};
pub use flow::Flow;
pub use middleware::{FlowMiddleware, NodeMiddleware};
pub use node::Node;
pub use processes::Processes;
pub use tracker::{Ledger, Pass, Signal, Tracker};

/// Locks `mutex`, recovering the data if a task panicked while holding it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
