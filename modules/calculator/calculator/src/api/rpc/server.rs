//! RPC server implementation for calculator
//!
//! Handles Calculator capability calls and delegates to the domain Service.

use std::rc::Rc;

use calculator_sdk::calculator_capnp::calculator;
use calculator_sdk::{CalculatorError, Expression};

use crate::domain::Service;

/// Calculator capability that wraps the domain Service.
#[derive(Debug, Clone)]
pub struct CalculatorServiceImpl {
    service: Service,
}

impl CalculatorServiceImpl {
    /// Create a new Calculator implementation with the given Service.
    #[must_use]
    pub fn new(service: Service) -> Self {
        Self { service }
    }

    /// Expose this implementation as a Calculator capability.
    #[must_use]
    pub fn into_client(self) -> calculator::Client {
        capnp_rpc::new_client(self)
    }
}

impl calculator::Server for CalculatorServiceImpl {
    async fn evaluate(
        self: Rc<Self>,
        params: calculator::EvaluateParams,
        mut results: calculator::EvaluateResults,
    ) -> Result<(), capnp::Error> {
        let expression = Expression::read(params.get()?.get_expression()?)?;
        let value = self.service.evaluate(expression)?;
        results.get().set_value(value.into_capnp());
        Ok(())
    }

    async fn get_operator(
        self: Rc<Self>,
        params: calculator::GetOperatorParams,
        mut results: calculator::GetOperatorResults,
    ) -> Result<(), capnp::Error> {
        let op = params.get()?.get_op().map_err(|capnp::NotInSchema(code)| {
            CalculatorError::OperatorNotFound(format!("operator #{code}"))
        })?;
        let function = self.service.get_operator(op.into())?;
        results.get().set_func(function.into_capnp());
        Ok(())
    }

    async fn def_function(
        self: Rc<Self>,
        params: calculator::DefFunctionParams,
        mut results: calculator::DefFunctionResults,
    ) -> Result<(), capnp::Error> {
        let params = params.get()?;
        let body = Expression::read(params.get_body()?)?;
        let function = self.service.def_function(params.get_param_count(), &body)?;
        results.get().set_func(function.into_capnp());
        Ok(())
    }
}
