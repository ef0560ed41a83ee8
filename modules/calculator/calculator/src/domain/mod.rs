pub mod evaluator;
pub mod operators;
pub mod service;
pub mod value;

pub use service::Service;
