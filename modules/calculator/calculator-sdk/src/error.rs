//! Calculator error type and its mapping onto Cap'n Proto errors.

use capnp::ErrorKind;
use serde::{Deserialize, Serialize};

/// Marks the tagged copy of a [`CalculatorError`] inside an exception reason.
const DETAIL_MARKER: &str = " (calculator-error ";

/// Error type for calculator operations.
///
/// Survives the network boundary unchanged. The exception reason carries the
/// readable message followed by a tagged JSON copy of the variant, which the
/// receiving side parses back.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum CalculatorError {
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error("operator not found: {0}")]
    OperatorNotFound(String),

    #[error("arity mismatch: expected {expected} arguments, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("unimplemented: {0}")]
    Unimplemented(String),

    #[error("remote call failed: {0}")]
    RemoteCallFailure(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),
}

impl CalculatorError {
    /// Recover a calculator error from an exception reason. Any number of
    /// `remote exception: ` prefixes added while the error was relayed are
    /// ignored.
    fn from_reason(reason: &str) -> Option<Self> {
        let start = reason.rfind(DETAIL_MARKER)? + DETAIL_MARKER.len();
        let tagged = reason[start..].strip_suffix(')')?;
        serde_json::from_str(tagged).ok()
    }
}

impl From<CalculatorError> for capnp::Error {
    fn from(err: CalculatorError) -> Self {
        let reason = match serde_json::to_string(&err) {
            Ok(tagged) => format!("{err}{DETAIL_MARKER}{tagged})"),
            Err(_) => err.to_string(),
        };
        match err {
            CalculatorError::Unimplemented(_) => Self::unimplemented(reason),
            CalculatorError::TransportFailure(_) => Self::disconnected(reason),
            _ => Self::failed(reason),
        }
    }
}

impl From<capnp::Error> for CalculatorError {
    fn from(err: capnp::Error) -> Self {
        if let Some(calc) = Self::from_reason(&err.extra) {
            return calc;
        }
        match err.kind {
            ErrorKind::Disconnected => Self::TransportFailure(err.to_string()),
            _ => Self::RemoteCallFailure(err.to_string()),
        }
    }
}
