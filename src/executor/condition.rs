//! Node conditions
//!
//! A condition gates whether a node executes. It runs its function stack,
//! resolves its named parameters from the store and hands them to an
//! [`Expression`].

use super::error::ConditionError;
use crate::core::{Expression, Params, Stack};
use crate::store::{Property, Store};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

/// Boolean gate evaluated before a node's call
#[derive(Clone)]
pub struct Condition {
    functions: Stack,
    params: BTreeMap<String, Property>,
    expression: Arc<dyn Expression>,
}

impl Condition {
    pub fn new(expression: impl Expression + 'static) -> Self {
        Self {
            functions: Stack::new(),
            params: BTreeMap::new(),
            expression: Arc::new(expression),
        }
    }

    /// Binds a named expression parameter
    pub fn with_param(mut self, name: impl Into<String>, property: Property) -> Self {
        self.params.insert(name.into(), property);
        self
    }

    /// Sets the functions run before the parameters are resolved
    pub fn with_functions(mut self, functions: Stack) -> Self {
        self.functions = functions;
        self
    }

    /// Evaluates the condition against the store.
    ///
    /// Unresolvable parameters are passed as `null`. A result that is not a
    /// boolean lets the node execute.
    pub fn eval(&self, store: &dyn Store) -> Result<bool, ConditionError> {
        self.functions.execute(store)?;

        let params: Params = self
            .params
            .iter()
            .map(|(name, property)| {
                let value = property.resolve(store).unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect();

        trace!(?params, "evaluating condition");

        let result = self
            .expression
            .evaluate(&params)
            .map_err(ConditionError::Expression)?;

        match result {
            Value::Bool(pass) => Ok(pass),
            other => {
                warn!(result = %other, "condition did not evaluate to a boolean, passing");
                Ok(true)
            }
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("functions", &self.functions)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
