//! Calculator Module
//!
//! Serves the calculator protocol over capability RPC: clients send
//! expression trees, the service evaluates them with pipelined calls and
//! hands back Value capabilities.
//!
//! ## Architecture
//!
//! - `domain/operators.rs` - arithmetic table and per-session operator functions
//! - `domain/value.rs` - Value capability implementations
//! - `domain/evaluator.rs` - pipelined expression evaluation
//! - `domain/service.rs` - per-session service logic
//! - `api/rpc/server.rs` - RPC server adapter over the domain service
//! - `session.rs` - listener, accept loop and per-connection sessions
//! - `config.rs` - service configuration
//!
//! Clients should use `calculator-sdk`, which provides the typed handles.
//! Everything here holds Cap'n Proto capabilities, which are not `Send`:
//! run the session manager inside a `tokio::task::LocalSet`.

// === CONFIGURATION ===
mod config;
pub use config::{CalculatorConfig, DEFAULT_LISTEN_ADDR, LoggingConfig};

// === SESSIONS ===
mod session;
pub use session::{ACCEPT_BACKOFF, SessionManager, run_session};

// === INTERNAL MODULES ===
#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
