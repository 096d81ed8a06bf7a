//! Core building blocks shared by the executor and its collaborators.
//!
//! - [`Function`] and [`Stack`]: ordered side-effecting units run against the store
//! - [`Expression`]: the evaluator contract conditions are built on
//! - [`BoxError`]: the error type at collaborator boundaries

mod expression;
mod functions;

pub use expression::{Expression, Params};
pub use functions::{Function, FunctionError, Stack};

/// Boxed error used at the boundary to external collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
