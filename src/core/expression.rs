use super::BoxError;
use serde_json::Value;
use std::collections::BTreeMap;

/// Named parameters handed to an expression
pub type Params = BTreeMap<String, Value>;

/// An evaluator bound to one compiled expression.
///
/// The expression grammar lives outside this crate; the engine only resolves
/// the parameters and interprets the result.
pub trait Expression: Send + Sync {
    fn evaluate(&self, params: &Params) -> Result<Value, BoxError>;
}

impl<F> Expression for F
where
    F: Fn(&Params) -> Result<Value, BoxError> + Send + Sync,
{
    fn evaluate(&self, params: &Params) -> Result<Value, BoxError> {
        self(params)
    }
}
