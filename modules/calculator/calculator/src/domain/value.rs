//! Value capability implementations.

use std::rc::Rc;

use calculator_sdk::calculator_capnp::calculator::value;
use calculator_sdk::{CalculatorError, ValueClient};
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};

/// A number known up front.
#[derive(Debug, Clone, Copy)]
pub struct LiteralValue(f64);

impl LiteralValue {
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn into_client(self) -> ValueClient {
        ValueClient::new(capnp_rpc::new_client(self))
    }
}

impl value::Server for LiteralValue {
    async fn read(
        self: Rc<Self>,
        _params: value::ReadParams,
        mut results: value::ReadResults,
    ) -> Result<(), capnp::Error> {
        results.get().set_value(self.0);
        Ok(())
    }
}

/// A number obtained by reading another Value.
///
/// The read is sent as soon as this is constructed; every later read of this
/// Value waits on that one request and sees its result, failure included.
pub struct ForwardedRead {
    read: Shared<LocalBoxFuture<'static, Result<f64, CalculatorError>>>,
}

impl ForwardedRead {
    #[must_use]
    pub fn start(source: &ValueClient) -> Self {
        Self {
            read: source.read().boxed_local().shared(),
        }
    }

    #[must_use]
    pub fn into_client(self) -> ValueClient {
        ValueClient::new(capnp_rpc::new_client(self))
    }
}

impl value::Server for ForwardedRead {
    async fn read(
        self: Rc<Self>,
        _params: value::ReadParams,
        mut results: value::ReadResults,
    ) -> Result<(), capnp::Error> {
        let value = self.read.clone().await?;
        results.get().set_value(value);
        Ok(())
    }
}
