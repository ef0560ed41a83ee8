//! Operator registry.
//!
//! The arithmetic table is built once per process and never changes. Each
//! session wraps it in its own Function capabilities, one per operator, that
//! hand out the same capability every time an operator is looked up.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::LazyLock;

use calculator_sdk::calculator_capnp::calculator;
use calculator_sdk::{Argument, CalculatorError, FunctionClient, Operator};
use tracing::debug;

use super::value::LiteralValue;

/// Number of arguments every operator function takes.
pub const OPERATOR_ARITY: usize = 2;

type Arithmetic = fn(f64, f64) -> f64;

static TABLE: LazyLock<HashMap<Operator, Arithmetic>> = LazyLock::new(|| {
    let entries: [(Operator, Arithmetic); 4] = [
        (Operator::Add, |a, b| a + b),
        (Operator::Subtract, |a, b| a - b),
        (Operator::Multiply, |a, b| a * b),
        (Operator::Divide, |a, b| a / b),
    ];
    HashMap::from(entries)
});

/// IEEE-754 arithmetic; division by zero yields an infinity or NaN.
///
/// # Errors
/// Returns `OperatorNotFound` if `op` has no table entry.
pub fn apply(op: Operator, a: f64, b: f64) -> Result<f64, CalculatorError> {
    TABLE
        .get(&op)
        .map(|arithmetic| arithmetic(a, b))
        .ok_or_else(|| CalculatorError::OperatorNotFound(op.to_string()))
}

/// Function capabilities of one session, one per built-in operator.
#[derive(Clone)]
pub struct Registry {
    functions: HashMap<Operator, FunctionClient>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: TABLE
                .keys()
                .map(|&op| (op, OperatorFunction::new(op).into_client()))
                .collect(),
        }
    }

    /// Function capability backing `op`.
    ///
    /// # Errors
    /// Returns `OperatorNotFound` if `op` has no registry entry.
    pub fn lookup(&self, op: Operator) -> Result<FunctionClient, CalculatorError> {
        self.functions
            .get(&op)
            .cloned()
            .ok_or_else(|| CalculatorError::OperatorNotFound(op.to_string()))
    }

    /// Resolve an operator name or symbol to its Function capability.
    ///
    /// # Errors
    /// Returns `OperatorNotFound` for anything that is not a built-in operator.
    pub fn lookup_symbol(&self, symbol: &str) -> Result<FunctionClient, CalculatorError> {
        self.lookup(symbol.parse()?)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut operators: Vec<_> = self.functions.keys().map(|op| op.name()).collect();
        operators.sort_unstable();
        f.debug_struct("Registry")
            .field("operators", &operators)
            .finish()
    }
}

/// Function capability for one operator.
#[derive(Debug, Clone, Copy)]
pub struct OperatorFunction {
    op: Operator,
}

impl OperatorFunction {
    #[must_use]
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    #[must_use]
    pub fn into_client(self) -> FunctionClient {
        FunctionClient::new(capnp_rpc::new_client(self))
    }

    /// Wait for both arguments, then compute.
    async fn apply(&self, params: Vec<Argument>) -> Result<f64, CalculatorError> {
        let [a, b] = <[Argument; OPERATOR_ARITY]>::try_from(params).map_err(|params| {
            CalculatorError::ArityMismatch {
                expected: OPERATOR_ARITY,
                actual: params.len(),
            }
        })?;
        let (a, b) = futures::try_join!(a.resolve(), b.resolve())?;
        let result = apply(self.op, a, b)?;
        debug!(op = %self.op, a, b, result, "applied operator");
        Ok(result)
    }
}

impl calculator::function::Server for OperatorFunction {
    async fn call(
        self: Rc<Self>,
        params: calculator::function::CallParams,
        mut results: calculator::function::CallResults,
    ) -> Result<(), capnp::Error> {
        let args = params
            .get()?
            .get_params()?
            .iter()
            .map(Argument::read)
            .collect::<capnp::Result<Vec<_>>>()?;
        let result = self.apply(args).await?;
        results
            .get()
            .set_value(LiteralValue::new(result).into_client().into_capnp());
        Ok(())
    }
}
