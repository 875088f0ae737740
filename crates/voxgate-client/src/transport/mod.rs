//! Gateway transport with enum dispatch.
//!
//! The primary connection is a bidirectional frame stream split into a send
//! half ([`GatewayTx`]) and a receive half ([`GatewayRx`]) so the session's
//! writer task and read loop can own their half independently. Two backends:
//!
//! - `WebSocket` — the real transport (JSON text frames over wss).
//! - `Local` — an in-process mpsc-backed pair; the test suite's scripted
//!   servers sit on the other end.

pub mod local;
pub mod websocket;

pub use local::{LocalEndpoint, LocalRx, LocalTx};
pub use websocket::{WsRx, WsTx};

use tokio::sync::mpsc;

use voxgate_core::error::{VoxError, VoxResult};
use voxgate_core::gateway::GatewayFrame;

use crate::rest::RestClient;

/// Enum-dispatched send half of a gateway connection.
pub enum GatewayTx {
    WebSocket(WsTx),
    Local(LocalTx),
}

impl GatewayTx {
    pub async fn send(&mut self, frame: &GatewayFrame) -> VoxResult<()> {
        match self {
            Self::WebSocket(t) => t.send(frame).await,
            Self::Local(t) => t.send(frame).await,
        }
    }

    pub async fn close(&mut self) -> VoxResult<()> {
        match self {
            Self::WebSocket(t) => t.close().await,
            Self::Local(t) => t.close().await,
        }
    }
}

/// Enum-dispatched receive half of a gateway connection.
pub enum GatewayRx {
    WebSocket(WsRx),
    Local(LocalRx),
}

impl GatewayRx {
    /// Receive the next control frame. `Ok(None)` means the peer closed.
    pub async fn recv(&mut self) -> VoxResult<Option<GatewayFrame>> {
        match self {
            Self::WebSocket(r) => r.recv().await,
            Self::Local(r) => r.recv().await,
        }
    }
}

/// How a session opens (and re-opens) its primary connection.
#[derive(Clone)]
pub enum Connector {
    /// Resolve the gateway URL through the request gateway, then dial it.
    WebSocket,
    /// Hand the server end of a fresh in-process pair to whoever holds the
    /// receiver. Each open produces a new [`LocalEndpoint`].
    Local(mpsc::Sender<LocalEndpoint>),
}

impl Connector {
    pub(crate) async fn open(&self, rest: &RestClient) -> VoxResult<(GatewayTx, GatewayRx)> {
        match self {
            Connector::WebSocket => {
                let url = rest.resolve_endpoint().await?;
                websocket::connect(&format!("{url}/?v=9&encoding=json")).await
            }
            Connector::Local(acceptor) => {
                let (client, server) = local::pair();
                acceptor
                    .send(server)
                    .await
                    .map_err(|_| VoxError::EndpointUnavailable)?;
                Ok(client)
            }
        }
    }
}
