//! WebSocket gateway transport.
//!
//! Control envelopes travel as JSON text frames. The stream half decodes
//! inbound text frames into [`GatewayFrame`]s; a frame that fails to decode
//! is logged and skipped rather than treated as a transport failure.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use voxgate_core::error::{VoxError, VoxResult};
use voxgate_core::gateway::GatewayFrame;

use super::{GatewayRx, GatewayTx};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Send half of a WebSocket gateway connection.
pub struct WsTx {
    sink: SplitSink<WsStream, Message>,
}

/// Receive half of a WebSocket gateway connection.
pub struct WsRx {
    stream: SplitStream<WsStream>,
}

/// Dial the gateway and split the connection into send/receive halves.
pub async fn connect(url: &str) -> VoxResult<(GatewayTx, GatewayRx)> {
    let (ws, _response) = connect_async(url)
        .await
        .map_err(|e| VoxError::Transport(format!("WebSocket connect error: {e}")))?;

    tracing::info!(url, "gateway connected");

    let (sink, stream) = ws.split();
    Ok((
        GatewayTx::WebSocket(WsTx { sink }),
        GatewayRx::WebSocket(WsRx { stream }),
    ))
}

impl WsTx {
    pub async fn send(&mut self, frame: &GatewayFrame) -> VoxResult<()> {
        let text = frame.encode()?;
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| VoxError::Transport(format!("WS send error: {e}")))
    }

    pub async fn close(&mut self) -> VoxResult<()> {
        let _ = self.sink.send(Message::Close(None)).await;
        Ok(())
    }
}

impl WsRx {
    /// Receive the next control frame. `Ok(None)` means the server closed.
    pub async fn recv(&mut self) -> VoxResult<Option<GatewayFrame>> {
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(Message::Text(text)) => match GatewayFrame::decode(&text) {
                    Ok(frame) => return Ok(Some(frame)),
                    Err(e) => {
                        tracing::warn!("undecodable gateway frame: {}", e);
                        continue;
                    }
                },
                Ok(Message::Close(_)) => {
                    tracing::debug!("gateway close frame received");
                    return Ok(None);
                }
                // tungstenite answers pings itself; binary frames are not
                // part of the control protocol.
                Ok(_) => continue,
                Err(e) => {
                    return Err(VoxError::Transport(format!("WS read error: {e}")));
                }
            }
        }
        Ok(None)
    }
}
