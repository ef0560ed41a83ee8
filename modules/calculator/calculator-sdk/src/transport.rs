//! Two-party transport helpers and the message-logging network decorator.
//!
//! [`stream_network`] runs the Cap'n Proto two-party protocol over any tokio
//! byte stream. [`DebugTransport`] wraps a network and reports every RPC
//! message sent or received on it to a [`MessageObserver`], forwarding the
//! message itself untouched.

use std::fmt;
use std::rc::Rc;

use capnp::capability::Promise;
use capnp::message::{Builder, HeapAllocator, ReaderOptions};
use capnp_rpc::rpc_capnp::message;
use capnp_rpc::rpc_twoparty_capnp::Side;
use capnp_rpc::twoparty::{self, VatId};
use capnp_rpc::{
    Connection, FlowController, IncomingMessage, OutgoingMessage, RpcSystem, VatNetwork,
};
use futures::{FutureExt, TryFutureExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};
use tracing::{info, warn};

use crate::calculator_capnp::calculator;
use crate::client::CalculatorClient;

/// Two-party network over `stream`. `side` tells the RPC system which end
/// holds the bootstrap capability.
#[must_use]
pub fn stream_network<S>(
    stream: S,
    side: Side,
) -> twoparty::VatNetwork<impl futures::AsyncRead + Unpin + 'static>
where
    S: AsyncRead + AsyncWrite + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    twoparty::VatNetwork::new(
        futures::io::BufReader::new(reader.compat()),
        futures::io::BufWriter::new(writer.compat_write()),
        side,
        ReaderOptions::new(),
    )
}

/// Client end of a calculator connection over `stream`.
///
/// Returns the bootstrap Calculator and the RPC system that carries its
/// calls. Nothing goes over the wire until the RPC system is polled, usually
/// by handing it to `tokio::task::spawn_local`.
#[must_use]
pub fn connect<S>(stream: S, debug_transport: bool) -> (CalculatorClient, RpcSystem<VatId>)
where
    S: AsyncRead + AsyncWrite + 'static,
{
    let network = stream_network(stream, Side::Client);
    let network: Box<dyn VatNetwork<VatId>> = if debug_transport {
        Box::new(DebugTransport::new(network))
    } else {
        Box::new(network)
    };
    let mut rpc_system = RpcSystem::new(network, None);
    let calculator: calculator::Client = rpc_system.bootstrap(Side::Server);
    (CalculatorClient::new(calculator), rpc_system)
}

/// Which way a message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sent => ">>",
            Self::Received => "<<",
        })
    }
}

/// Receives every message a [`DebugTransport`] forwards.
pub trait MessageObserver {
    fn message(&self, direction: Direction, message: message::Reader<'_>);

    fn failed(&self, direction: Direction, err: &capnp::Error);
}

/// Logs one record per message at INFO and every failure at WARN.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessages;

impl MessageObserver for LogMessages {
    fn message(&self, direction: Direction, message: message::Reader<'_>) {
        info!(%direction, kind = message_kind(message), body = ?message, "rpc message");
    }

    fn failed(&self, direction: Direction, err: &capnp::Error) {
        warn!(%direction, error = %err, "rpc message failed");
    }
}

/// Name of the RPC message variant, e.g. `call` or `return`.
#[must_use]
pub fn message_kind(message: message::Reader<'_>) -> &'static str {
    match message.which() {
        Ok(message::Which::Unimplemented(_)) => "unimplemented",
        Ok(message::Which::Abort(_)) => "abort",
        Ok(message::Which::Call(_)) => "call",
        Ok(message::Which::Return(_)) => "return",
        Ok(message::Which::Finish(_)) => "finish",
        Ok(message::Which::Resolve(_)) => "resolve",
        Ok(message::Which::Release(_)) => "release",
        Ok(message::Which::ObsoleteSave(_)) => "obsoleteSave",
        Ok(message::Which::Bootstrap(_)) => "bootstrap",
        Ok(message::Which::ObsoleteDelete(_)) => "obsoleteDelete",
        Ok(message::Which::Provide(_)) => "provide",
        Ok(message::Which::Accept(_)) => "accept",
        Ok(message::Which::Join(_)) => "join",
        Ok(message::Which::Disembargo(_)) => "disembargo",
        Err(_) => "unknown",
    }
}

/// Whether the message asks the peer for an answer.
#[must_use]
pub fn is_request(message: message::Reader<'_>) -> bool {
    matches!(
        message.which(),
        Ok(message::Which::Call(_) | message::Which::Bootstrap(_))
    )
}

fn observe<O: MessageObserver>(
    observer: &O,
    direction: Direction,
    body: capnp::Result<capnp::any_pointer::Reader<'_>>,
) {
    match body.and_then(|body| body.get_as::<message::Reader<'_>>()) {
        Ok(message) => observer.message(direction, message),
        Err(e) => observer.failed(direction, &e),
    }
}

/// Network decorator that shows every RPC message to an observer.
///
/// Messages, connection shutdown and flow control all go to the wrapped
/// network unchanged.
pub struct DebugTransport<O = LogMessages> {
    inner: Box<dyn VatNetwork<VatId>>,
    observer: Rc<O>,
}

impl DebugTransport {
    #[must_use]
    pub fn new(inner: impl VatNetwork<VatId> + 'static) -> Self {
        Self::with_observer(inner, LogMessages)
    }
}

impl<O: MessageObserver + 'static> DebugTransport<O> {
    #[must_use]
    pub fn with_observer(inner: impl VatNetwork<VatId> + 'static, observer: O) -> Self {
        Self {
            inner: Box::new(inner),
            observer: Rc::new(observer),
        }
    }

    fn wrap(observer: &Rc<O>, inner: Box<dyn Connection<VatId>>) -> Box<dyn Connection<VatId>> {
        Box::new(DebugConnection {
            inner,
            observer: Rc::clone(observer),
        })
    }
}

impl<O> fmt::Debug for DebugTransport<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugTransport").finish_non_exhaustive()
    }
}

impl<O: MessageObserver + 'static> VatNetwork<VatId> for DebugTransport<O> {
    fn connect(&mut self, host_id: VatId) -> Option<Box<dyn Connection<VatId>>> {
        let inner = self.inner.connect(host_id)?;
        Some(Self::wrap(&self.observer, inner))
    }

    fn accept(&mut self) -> Promise<Box<dyn Connection<VatId>>, capnp::Error> {
        let observer = Rc::clone(&self.observer);
        Promise::from_future(
            self.inner
                .accept()
                .map_ok(move |inner| Self::wrap(&observer, inner)),
        )
    }

    fn drive_until_shutdown(&mut self) -> Promise<(), capnp::Error> {
        self.inner.drive_until_shutdown()
    }
}

struct DebugConnection<O> {
    inner: Box<dyn Connection<VatId>>,
    observer: Rc<O>,
}

impl<O: MessageObserver + 'static> Connection<VatId> for DebugConnection<O> {
    fn get_peer_vat_id(&self) -> VatId {
        self.inner.get_peer_vat_id()
    }

    fn new_outgoing_message(&mut self, first_segment_word_size: u32) -> Box<dyn OutgoingMessage> {
        Box::new(DebugOutgoing {
            inner: self.inner.new_outgoing_message(first_segment_word_size),
            observer: Rc::clone(&self.observer),
        })
    }

    fn receive_incoming_message(
        &mut self,
    ) -> Promise<Option<Box<dyn IncomingMessage>>, capnp::Error> {
        let observer = Rc::clone(&self.observer);
        Promise::from_future(self.inner.receive_incoming_message().map(move |received| {
            match &received {
                Ok(Some(message)) => observe(&*observer, Direction::Received, message.get_body()),
                Ok(None) => {}
                Err(e) => observer.failed(Direction::Received, e),
            }
            received
        }))
    }

    fn new_stream(&mut self) -> (Box<dyn FlowController>, Promise<(), capnp::Error>) {
        self.inner.new_stream()
    }

    fn shutdown(&mut self, result: capnp::Result<()>) -> Promise<(), capnp::Error> {
        self.inner.shutdown(result)
    }
}

struct DebugOutgoing<O> {
    inner: Box<dyn OutgoingMessage>,
    observer: Rc<O>,
}

impl<O: MessageObserver + 'static> OutgoingMessage for DebugOutgoing<O> {
    fn get_body(&mut self) -> capnp::Result<capnp::any_pointer::Builder<'_>> {
        self.inner.get_body()
    }

    fn get_body_as_reader(&self) -> capnp::Result<capnp::any_pointer::Reader<'_>> {
        self.inner.get_body_as_reader()
    }

    fn send(self: Box<Self>) -> (Promise<(), capnp::Error>, Rc<Builder<HeapAllocator>>) {
        let Self { inner, observer } = *self;
        observe(&*observer, Direction::Sent, inner.get_body_as_reader());
        let (sent, message) = inner.send();
        let sent = sent.map_err(move |e| {
            observer.failed(Direction::Sent, &e);
            e
        });
        (Promise::from_future(sent), message)
    }

    fn take(self: Box<Self>) -> Builder<HeapAllocator> {
        self.inner.take()
    }

    fn size_in_words(&self) -> usize {
        self.inner.size_in_words()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions_print_as_arrows() {
        assert_eq!(Direction::Sent.to_string(), ">>");
        assert_eq!(Direction::Received.to_string(), "<<");
    }
}
