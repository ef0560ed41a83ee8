//! Typed handles over calculator capabilities.
//!
//! Every method issues its call immediately. Methods that return a capability
//! hand back a [`Pending`], which can be pipelined on before the call returns.

use std::fmt;
use std::future::Future;

use capnp::capability::{FromClientHook, RemotePromise};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tracing::debug;

use crate::calculator_capnp::calculator;
use crate::error::CalculatorError;
use crate::expression::{Argument, Expression, Operator, list_len};

/// Capability returned by a call that may not have finished yet.
#[must_use = "a pending capability does nothing unless pipelined or resolved"]
pub struct Pending<T> {
    pipelined: T,
    response: LocalBoxFuture<'static, Result<T, CalculatorError>>,
}

impl<T: Clone + 'static> Pending<T> {
    fn new(
        pipelined: T,
        response: impl Future<Output = Result<T, CalculatorError>> + 'static,
    ) -> Self {
        Self {
            pipelined,
            response: response.boxed_local(),
        }
    }

    /// A call that failed before it was sent. `broken` fails every call made
    /// on it with `err`.
    fn failed(broken: T, err: CalculatorError) -> Self {
        Self::new(broken, futures::future::ready(Err(err)))
    }

    /// Handle to the capability before it exists. Calls on it are pipelined
    /// behind the original call; if that call fails, they fail the same way.
    #[must_use]
    pub fn pipeline(&self) -> T {
        self.pipelined.clone()
    }

    /// Wait for the call to return.
    ///
    /// # Errors
    /// Returns the failure raised by the callee or the transport.
    pub async fn resolve(self) -> Result<T, CalculatorError> {
        self.response.await
    }
}

impl<T: fmt::Debug> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("pipelined", &self.pipelined)
            .finish_non_exhaustive()
    }
}

fn broken<C: FromClientHook>(err: CalculatorError) -> C {
    capnp_rpc::new_broken_cap(err.into()).cast_to()
}

/// Handle to a Value capability.
#[derive(Clone)]
pub struct ValueClient {
    inner: calculator::value::Client,
}

impl ValueClient {
    #[must_use]
    pub fn new(inner: calculator::value::Client) -> Self {
        Self { inner }
    }

    /// A Value whose every read fails with `err`.
    #[must_use]
    pub fn broken(err: CalculatorError) -> Self {
        Self::new(broken(err))
    }

    #[must_use]
    pub fn to_capnp(&self) -> calculator::value::Client {
        self.inner.clone()
    }

    #[must_use]
    pub fn into_capnp(self) -> calculator::value::Client {
        self.inner
    }

    /// Whether both handles point at the same object.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        self.inner.client.hook.get_ptr() == other.inner.client.hook.get_ptr()
    }

    /// Fetch the number. The call is sent before this returns, so reads can
    /// be issued eagerly and awaited later.
    pub fn read(&self) -> impl Future<Output = Result<f64, CalculatorError>> + 'static {
        let promise = self.inner.read_request().send().promise;
        async move {
            let response = promise.await?;
            Ok(response.get()?.get_value())
        }
    }
}

impl fmt::Debug for ValueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueClient").finish_non_exhaustive()
    }
}

/// Handle to a Function capability.
#[derive(Clone)]
pub struct FunctionClient {
    inner: calculator::function::Client,
}

impl FunctionClient {
    #[must_use]
    pub fn new(inner: calculator::function::Client) -> Self {
        Self { inner }
    }

    /// A Function whose every call fails with `err`.
    #[must_use]
    pub fn broken(err: CalculatorError) -> Self {
        Self::new(broken(err))
    }

    #[must_use]
    pub fn to_capnp(&self) -> calculator::function::Client {
        self.inner.clone()
    }

    #[must_use]
    pub fn into_capnp(self) -> calculator::function::Client {
        self.inner
    }

    /// Whether both handles point at the same object.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        self.inner.client.hook.get_ptr() == other.inner.client.hook.get_ptr()
    }

    /// Apply the function. Arguments may be Values that are still pending.
    pub fn call(&self, params: &[Argument]) -> Pending<ValueClient> {
        let mut request = self.inner.call_request();
        let len = match list_len(params.len()) {
            Ok(len) => len,
            Err(e) => return failed_value(e.into()),
        };
        let mut list = request.get().init_params(len);
        for (index, arg) in (0..).zip(params) {
            arg.write(list.reborrow().get(index));
        }

        let RemotePromise { promise, pipeline } = request.send();
        Pending::new(ValueClient::new(pipeline.get_value()), async move {
            let response = promise.await?;
            Ok(ValueClient::new(response.get()?.get_value()?))
        })
    }
}

impl fmt::Debug for FunctionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionClient").finish_non_exhaustive()
    }
}

fn failed_value(err: CalculatorError) -> Pending<ValueClient> {
    Pending::failed(ValueClient::broken(err.clone()), err)
}

fn failed_function(err: CalculatorError) -> Pending<FunctionClient> {
    Pending::failed(FunctionClient::broken(err.clone()), err)
}

/// Handle to the Calculator bootstrap capability.
#[derive(Clone)]
pub struct CalculatorClient {
    inner: calculator::Client,
}

impl CalculatorClient {
    #[must_use]
    pub fn new(inner: calculator::Client) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn to_capnp(&self) -> calculator::Client {
        self.inner.clone()
    }

    pub fn evaluate(&self, expression: &Expression) -> Pending<ValueClient> {
        let mut request = self.inner.evaluate_request();
        if let Err(e) = expression.write(request.get().init_expression()) {
            return failed_value(e.into());
        }

        let RemotePromise { promise, pipeline } = request.send();
        Pending::new(ValueClient::new(pipeline.get_value()), async move {
            let response = promise.await?;
            Ok(ValueClient::new(response.get()?.get_value()?))
        })
    }

    pub fn get_operator(&self, op: Operator) -> Pending<FunctionClient> {
        let mut request = self.inner.get_operator_request();
        request.get().set_op(op.into());

        let RemotePromise { promise, pipeline } = request.send();
        Pending::new(FunctionClient::new(pipeline.get_func()), async move {
            let response = promise.await?;
            Ok(FunctionClient::new(response.get()?.get_func()?))
        })
    }

    /// Look an operator up by name or symbol. Anything that is not a
    /// built-in operator yields a Function that fails with `OperatorNotFound`.
    pub fn get_operator_by_symbol(&self, symbol: &str) -> Pending<FunctionClient> {
        match symbol.parse() {
            Ok(op) => self.get_operator(op),
            Err(e) => {
                debug!(symbol, "unknown operator symbol");
                failed_function(e)
            }
        }
    }

    pub fn def_function(&self, param_count: i32, body: &Expression) -> Pending<FunctionClient> {
        let mut request = self.inner.def_function_request();
        let mut params = request.get();
        params.set_param_count(param_count);
        if let Err(e) = body.write(params.init_body()) {
            return failed_function(e.into());
        }

        let RemotePromise { promise, pipeline } = request.send();
        Pending::new(FunctionClient::new(pipeline.get_func()), async move {
            let response = promise.await?;
            Ok(FunctionClient::new(response.get()?.get_func()?))
        })
    }
}

impl fmt::Debug for CalculatorClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculatorClient").finish_non_exhaustive()
    }
}
