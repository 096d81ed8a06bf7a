//! Function stacks
//!
//! A function is a named, side-effecting unit that reads from and writes to
//! the reference store, e.g. deriving a request parameter before encoding.
//! Calls and conditions carry ordered stacks of them.

use super::BoxError;
use crate::store::Store;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// A side-effecting unit of work run against the reference store
pub trait Function: Send + Sync {
    fn call(&self, store: &dyn Store) -> Result<(), BoxError>;
}

impl<F> Function for F
where
    F: Fn(&dyn Store) -> Result<(), BoxError> + Send + Sync,
{
    fn call(&self, store: &dyn Store) -> Result<(), BoxError> {
        self(store)
    }
}

/// A function of a stack failed
#[derive(Debug, Error)]
#[error("function '{name}' failed")]
pub struct FunctionError {
    pub name: String,
    #[source]
    pub source: BoxError,
}

/// Ordered collection of named functions
///
/// Functions run in the order they were pushed, inside the calling task.
#[derive(Clone, Default)]
pub struct Stack {
    functions: Vec<(String, Arc<dyn Function>)>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a function to the stack
    pub fn push(&mut self, name: impl Into<String>, function: impl Function + 'static) {
        self.functions.push((name.into(), Arc::new(function)));
    }

    /// Appends a function, builder style
    pub fn with(mut self, name: impl Into<String>, function: impl Function + 'static) -> Self {
        self.push(name, function);
        self
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Returns the function names in execution order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|(name, _)| name.as_str())
    }

    /// Runs every function in order, stopping at the first failure
    pub fn execute(&self, store: &dyn Store) -> Result<(), FunctionError> {
        for (name, function) in &self.functions {
            function.call(store).map_err(|source| FunctionError {
                name: name.clone(),
                source,
            })?;
        }

        Ok(())
    }

    /// Runs every function in order regardless of failures.
    ///
    /// Failures are logged and counted; the count is returned.
    pub fn execute_all(&self, store: &dyn Store) -> usize {
        let mut failed = 0;

        for (name, function) in &self.functions {
            if let Err(err) = function.call(store) {
                warn!(function = %name, error = %err, "function failed");
                failed += 1;
            }
        }

        failed
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
