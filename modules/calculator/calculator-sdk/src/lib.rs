//! Calculator SDK
//!
//! This crate provides everything needed to talk to the calculator service
//! or to implement it:
//! - the Cap'n Proto schema and its generated code (`calculator_capnp`)
//! - expression and operator types (`Expression`, `Argument`, `Operator`)
//! - typed capability clients (`CalculatorClient`, `FunctionClient`, `ValueClient`)
//! - the two-party transport helpers and the message-logging `DebugTransport`
//! - the error type (`CalculatorError`)
//!
//! Servers implement the generated `calculator_capnp::calculator::*::Server`
//! traits directly.
//!
//! ## Usage
//!
//! ```ignore
//! use calculator_sdk::{Expression, Operator, connect};
//!
//! let (calculator, rpc_system) = connect(stream, false);
//! tokio::task::spawn_local(rpc_system);
//!
//! let add = calculator.get_operator(Operator::Add).pipeline();
//! let value = calculator
//!     .evaluate(&Expression::call(add, vec![Expression::Literal(2.0), Expression::Literal(3.0)]))
//!     .pipeline();
//! assert_eq!(value.read().await?, 5.0);
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

// === GENERATED SCHEMA CODE ===
/// Code generated from `schema/calculator.capnp`.
#[allow(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::restriction,
    rust_2018_idioms,
    unused_qualifications,
    unused
)]
pub mod calculator_capnp {
    include!(concat!(env!("OUT_DIR"), "/calculator_capnp.rs"));
}

// === API TYPES ===
mod error;
pub use error::CalculatorError;

mod expression;
pub use expression::{Argument, Expression, Operator};

// === CLIENTS ===
mod client;
pub use client::{CalculatorClient, FunctionClient, Pending, ValueClient};

// === TRANSPORT ===
pub mod transport;
pub use transport::{DebugTransport, connect};

/// Service name used in logs and spans.
pub const SERVICE_NAME: &str = "calculator.v1.Calculator";
