//! Expression trees, call arguments and the built-in operators, with their
//! mapping onto the generated schema types.

use std::fmt;
use std::str::FromStr;

use crate::calculator_capnp::calculator::{self, argument, expression};
use crate::client::{FunctionClient, ValueClient};
use crate::error::CalculatorError;

/// Expression tree sent with `evaluate`.
#[derive(Debug, Clone)]
pub enum Expression {
    Literal(f64),
    /// Value returned by an earlier call, reused without resending data.
    PreviousResult(ValueClient),
    /// Positional parameter of a user-defined function body.
    Parameter(u32),
    Call {
        function: FunctionClient,
        params: Vec<Expression>,
    },
}

impl Expression {
    #[must_use]
    pub fn call(function: FunctionClient, params: Vec<Expression>) -> Self {
        Self::Call { function, params }
    }

    /// Variant name as it appears in the schema.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::PreviousResult(_) => "previousResult",
            Self::Parameter(_) => "parameter",
            Self::Call { .. } => "call",
        }
    }

    /// Fill `builder` with this tree. Capabilities go into the message's
    /// capability table.
    ///
    /// # Errors
    /// Fails if a parameter list is longer than a Cap'n Proto list can be.
    pub fn write(&self, mut builder: expression::Builder<'_>) -> capnp::Result<()> {
        match self {
            Self::Literal(value) => builder.set_literal(*value),
            Self::PreviousResult(value) => builder.set_previous_result(value.to_capnp()),
            Self::Parameter(index) => builder.set_parameter(*index),
            Self::Call { function, params } => {
                let mut call = builder.init_call();
                call.set_function(function.to_capnp());
                let mut list = call.init_params(list_len(params.len())?);
                for (index, param) in (0..).zip(params) {
                    param.write(list.reborrow().get(index))?;
                }
            }
        }
        Ok(())
    }

    /// # Errors
    /// Fails on a malformed message or an unknown union member.
    pub fn read(reader: expression::Reader<'_>) -> capnp::Result<Self> {
        Ok(match reader.which()? {
            expression::Which::Literal(value) => Self::Literal(value),
            expression::Which::PreviousResult(value) => {
                Self::PreviousResult(ValueClient::new(value?))
            }
            expression::Which::Parameter(index) => Self::Parameter(index),
            expression::Which::Call(call) => Self::Call {
                function: FunctionClient::new(call.get_function()?),
                params: call
                    .get_params()?
                    .iter()
                    .map(Self::read)
                    .collect::<capnp::Result<_>>()?,
            },
        })
    }
}

/// One argument of a Function call.
#[derive(Debug, Clone)]
pub enum Argument {
    Number(f64),
    /// A Value that may still be pending when the call is issued.
    Value(ValueClient),
}

impl Argument {
    pub fn write(&self, mut builder: argument::Builder<'_>) {
        match self {
            Self::Number(value) => builder.set_number(*value),
            Self::Value(value) => builder.set_value(value.to_capnp()),
        }
    }

    /// # Errors
    /// Fails on a malformed message or an unknown union member.
    pub fn read(reader: argument::Reader<'_>) -> capnp::Result<Self> {
        Ok(match reader.which()? {
            argument::Which::Number(value) => Self::Number(value),
            argument::Which::Value(value) => Self::Value(ValueClient::new(value?)),
        })
    }

    /// The number this argument stands for, reading the Value if needed.
    ///
    /// # Errors
    /// Returns the failure of the read.
    pub async fn resolve(self) -> Result<f64, CalculatorError> {
        match self {
            Self::Number(value) => Ok(value),
            Self::Value(value) => value.read().await,
        }
    }
}

/// Length of a Cap'n Proto list holding `len` elements.
///
/// # Errors
/// Fails if `len` does not fit in a list length.
pub fn list_len(len: usize) -> capnp::Result<u32> {
    u32::try_from(len)
        .map_err(|_| capnp::Error::failed(format!("list of {len} elements is too long")))
}

/// Built-in arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    pub const ALL: [Self; 4] = [Self::Add, Self::Subtract, Self::Multiply, Self::Divide];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }
}

impl From<Operator> for calculator::Operator {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Add => Self::Add,
            Operator::Subtract => Self::Subtract,
            Operator::Multiply => Self::Multiply,
            Operator::Divide => Self::Divide,
        }
    }
}

impl From<calculator::Operator> for Operator {
    fn from(op: calculator::Operator) -> Self {
        match op {
            calculator::Operator::Add => Self::Add,
            calculator::Operator::Subtract => Self::Subtract,
            calculator::Operator::Multiply => Self::Multiply,
            calculator::Operator::Divide => Self::Divide,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = CalculatorError;

    /// Accepts operator names (any case) and their symbols.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.symbol() == s || op.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CalculatorError::OperatorNotFound(s.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn operators_parse_from_names_and_symbols() {
        assert_eq!("add".parse::<Operator>().unwrap(), Operator::Add);
        assert_eq!("+".parse::<Operator>().unwrap(), Operator::Add);
        assert_eq!("Subtract".parse::<Operator>().unwrap(), Operator::Subtract);
        assert_eq!("*".parse::<Operator>().unwrap(), Operator::Multiply);
        assert_eq!("DIVIDE".parse::<Operator>().unwrap(), Operator::Divide);
    }

    #[test]
    fn unknown_operator_is_not_found() {
        assert_eq!(
            "pow".parse::<Operator>().unwrap_err(),
            CalculatorError::OperatorNotFound("pow".to_owned())
        );
    }

    #[test]
    fn operators_map_onto_schema_enumerants() {
        for op in Operator::ALL {
            let wire = calculator::Operator::from(op);
            assert_eq!(Operator::from(wire), op);
        }
        assert_eq!(calculator::Operator::Divide as u16, 3);
    }
}
