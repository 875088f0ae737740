//! In-process gateway transport pair.
//!
//! Two mpsc channels wired back to back. The client side plugs into a
//! session exactly like the WebSocket transport; the server side
//! ([`LocalEndpoint`]) is driven by a scripted task in tests.

use tokio::sync::mpsc;

use voxgate_core::error::{VoxError, VoxResult};
use voxgate_core::gateway::GatewayFrame;

use super::{GatewayRx, GatewayTx};

const CHANNEL_CAPACITY: usize = 64;

/// Send half of an in-process connection.
pub struct LocalTx {
    tx: mpsc::Sender<GatewayFrame>,
}

/// Receive half of an in-process connection.
pub struct LocalRx {
    rx: mpsc::Receiver<GatewayFrame>,
}

/// The server end of an in-process pair.
pub struct LocalEndpoint {
    pub tx: LocalTx,
    pub rx: LocalRx,
}

/// Create a connected (client, server) transport pair.
pub fn pair() -> ((GatewayTx, GatewayRx), LocalEndpoint) {
    let (client_tx, server_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (server_tx, client_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let client = (
        GatewayTx::Local(LocalTx { tx: client_tx }),
        GatewayRx::Local(LocalRx { rx: client_rx }),
    );
    let server = LocalEndpoint {
        tx: LocalTx { tx: server_tx },
        rx: LocalRx { rx: server_rx },
    };
    (client, server)
}

impl LocalTx {
    pub async fn send(&mut self, frame: &GatewayFrame) -> VoxResult<()> {
        self.tx
            .send(frame.clone())
            .await
            .map_err(|_| VoxError::Transport("peer closed".into()))
    }

    pub async fn close(&mut self) -> VoxResult<()> {
        // Dropping the sender is the close; nothing to flush.
        Ok(())
    }
}

impl LocalRx {
    pub async fn recv(&mut self) -> VoxResult<Option<GatewayFrame>> {
        Ok(self.rx.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_cross_the_pair() {
        let ((mut ctx, mut crx), mut server) = pair();

        ctx.send(&GatewayFrame::heartbeat()).await.unwrap();
        let got = server.rx.recv().await.unwrap().unwrap();
        assert_eq!(got.op, voxgate_core::gateway::OP_HEARTBEAT);

        server.tx.send(&GatewayFrame::hello(1000)).await.unwrap();
        let got = crx.recv().await.unwrap().unwrap();
        assert_eq!(got.hello_interval_ms(), Some(1000));
    }

    #[tokio::test]
    async fn dropped_server_reads_as_eof() {
        let ((_ctx, mut crx), server) = pair();
        drop(server);
        assert!(crx.recv().await.unwrap().is_none());
    }
}
