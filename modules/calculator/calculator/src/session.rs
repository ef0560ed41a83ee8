//! Connection session manager.
//!
//! One listener, one accept loop, one local task per accepted connection.
//! Each session gets its own Calculator capability and its own capability
//! tables; nothing is shared between sessions except the arithmetic table.
//!
//! Capabilities are not `Send`, so [`SessionManager::serve`] and
//! [`run_session`] must run inside a `tokio::task::LocalSet`.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use calculator_sdk::transport::stream_network;
use calculator_sdk::{DebugTransport, SERVICE_NAME};
use capnp_rpc::rpc_twoparty_capnp::Side;
use capnp_rpc::twoparty::VatId;
use capnp_rpc::{RpcSystem, VatNetwork};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use crate::api::rpc::CalculatorServiceImpl;
use crate::config::CalculatorConfig;
use crate::domain::Service;

/// Pause after a failed accept before trying again.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections and runs one calculator session per connection.
pub struct SessionManager {
    listener: TcpListener,
    debug_transport: bool,
    next_session: u64,
}

impl SessionManager {
    /// Bind the configured listen address.
    ///
    /// # Errors
    /// Fails if the address cannot be bound.
    pub async fn bind(config: &CalculatorConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| {
                format!("failed to bind calculator listener at '{}'", config.listen_addr)
            })?;
        Ok(Self {
            listener,
            debug_transport: config.debug_transport,
            next_session: 0,
        })
    }

    /// Address actually bound, useful when the configured port is 0.
    ///
    /// # Errors
    /// Fails if the socket cannot report its address.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `cancel` fires. Sessions still running at
    /// that point finish on their own tasks.
    ///
    /// A failed accept is logged and retried after [`ACCEPT_BACKOFF`], so a
    /// persistent error such as descriptor exhaustion does not spin the loop.
    ///
    /// # Errors
    /// Fails only if the listener cannot report its address.
    pub async fn serve(mut self, cancel: CancellationToken) -> anyhow::Result<()> {
        let bound_addr = self.local_addr()?;
        info!(
            service = SERVICE_NAME,
            %bound_addr,
            debug_transport = self.debug_transport,
            "calculator listening"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!(%bound_addr, "calculator listener stopping");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_session(stream, peer),
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        back_off(&cancel).await;
                    }
                },
            }
        }
    }

    fn spawn_session(&mut self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let id = self.next_session;
        self.next_session += 1;
        if let Err(e) = stream.set_nodelay(true) {
            warn!(session = id, %peer, error = %e, "failed to disable Nagle");
        }
        let span = info_span!("session", id, %peer);
        tokio::task::spawn_local(run_session(stream, id, self.debug_transport).instrument(span));
    }
}

/// Wait out [`ACCEPT_BACKOFF`] unless `cancel` fires first.
async fn back_off(cancel: &CancellationToken) {
    tokio::select! {
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(ACCEPT_BACKOFF) => {}
    }
}

/// Serve one calculator session over `stream` until it ends.
///
/// Termination is logged as a warning whether the peer hung up or the
/// session failed; it is never propagated.
pub async fn run_session<S>(stream: S, id: u64, debug_transport: bool)
where
    S: AsyncRead + AsyncWrite + 'static,
{
    let calculator = CalculatorServiceImpl::new(Service::new(id)).into_client();
    let network = stream_network(stream, Side::Server);
    let network: Box<dyn VatNetwork<VatId>> = if debug_transport {
        Box::new(DebugTransport::new(network))
    } else {
        Box::new(network)
    };
    let rpc_system = RpcSystem::new(network, Some(calculator.client));

    info!("session started");
    match rpc_system.await {
        Ok(()) => warn!("session ended: peer disconnected"),
        Err(e) => warn!(error = %e, "session ended with error"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn accept_errors_pause_before_retrying() {
        let started = Instant::now();
        back_off(&CancellationToken::new()).await;
        assert!(started.elapsed() >= ACCEPT_BACKOFF);
    }

    #[tokio::test]
    async fn cancellation_cuts_the_pause_short() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let started = Instant::now();
        back_off(&cancel).await;
        assert!(started.elapsed() < ACCEPT_BACKOFF);
    }
}
