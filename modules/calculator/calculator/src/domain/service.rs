//! Domain service for calculator
//!
//! Contains the logic behind the three Calculator methods.

use calculator_sdk::{CalculatorError, Expression, FunctionClient, Operator, ValueClient};
use tracing::debug;

use super::evaluator;
use super::operators::Registry;

/// Domain service bound to one session.
///
/// Holds the session's operator capabilities and nothing else; every
/// evaluation is independent.
#[derive(Debug, Clone)]
pub struct Service {
    session: u64,
    operators: Registry,
}

impl Service {
    /// Create a service for session `session`.
    #[must_use]
    pub fn new(session: u64) -> Self {
        Self {
            session,
            operators: Registry::new(),
        }
    }

    #[must_use]
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Evaluate `expression` into a Value without waiting on any call.
    ///
    /// # Errors
    /// Returns the evaluator's failure unchanged.
    pub fn evaluate(&self, expression: Expression) -> Result<ValueClient, CalculatorError> {
        debug!(session = self.session, kind = expression.kind(), "evaluating expression");
        evaluator::evaluate(expression)
    }

    /// # Errors
    /// Returns `OperatorNotFound` for operators without a registry entry.
    pub fn get_operator(&self, op: Operator) -> Result<FunctionClient, CalculatorError> {
        debug!(session = self.session, %op, "looking up operator");
        self.operators.lookup(op)
    }

    /// User-defined functions are not supported.
    ///
    /// # Errors
    /// Always returns `Unimplemented("defFunction")`.
    pub fn def_function(
        &self,
        param_count: i32,
        body: &Expression,
    ) -> Result<FunctionClient, CalculatorError> {
        debug!(
            session = self.session,
            param_count,
            body = body.kind(),
            "rejecting user-defined function"
        );
        Err(CalculatorError::Unimplemented("defFunction".to_owned()))
    }
}
