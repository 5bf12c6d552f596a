//! WebSocket transport.
//!
//! Application messages travel as JSON text frames; the heartbeat is a
//! zero-length binary frame. Anything else on the socket is either
//! control traffic handled by the protocol layer or noise to skip.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transport::{Connector, TransportParts, TransportReceiver, TransportSender};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use lockstep_protocol::WireFrame;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects room channels to the configured endpoint over WebSocket.
pub struct WsConnector {
    config: Config,
}

impl WsConnector {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, room_id: &str) -> Result<TransportParts> {
        let url = self.config.room_url(room_id)?;
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::Transport(format!("connect to {url}: {e}")))?;
        tracing::debug!(%url, "websocket connected");

        let (sink, stream) = stream.split();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        Ok(TransportParts {
            sender: Box::new(WsSender { sink }),
            receiver: Box::new(WsReceiver {
                stream,
                inbound_tx,
            }),
            inbound,
        })
    }
}

struct WsSender {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl TransportSender for WsSender {
    async fn send(&mut self, frame: WireFrame) -> Result<()> {
        let message = match frame {
            WireFrame::Heartbeat => Message::Binary(Vec::new()),
            WireFrame::Message(value) => Message::Text(serde_json::to_string(&value)?),
        };
        self.sink
            .send(message)
            .await
            .map_err(|e| Error::Transport(format!("websocket write: {e}")))
    }
}

struct WsReceiver {
    stream: SplitStream<WsStream>,
    inbound_tx: mpsc::UnboundedSender<WireFrame>,
}

#[async_trait]
impl TransportReceiver for WsReceiver {
    async fn run(&mut self) -> Result<()> {
        while let Some(item) = self.stream.next().await {
            let frame = match item {
                Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                    Ok(value) => WireFrame::Message(value),
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping unparseable text frame");
                        continue;
                    }
                },
                Ok(Message::Binary(payload)) if payload.is_empty() => WireFrame::Heartbeat,
                Ok(Message::Binary(_)) => {
                    tracing::debug!("skipping non-empty binary frame");
                    continue;
                }
                Ok(Message::Close(_)) => return Ok(()),
                // Protocol-level control frames; the library answers pings
                // itself.
                Ok(_) => continue,
                Err(e) => return Err(Error::Transport(format!("websocket read: {e}"))),
            };

            if self.inbound_tx.send(frame).is_err() {
                // Consumer went away; nothing left to read for.
                return Ok(());
            }
        }
        Ok(())
    }
}
