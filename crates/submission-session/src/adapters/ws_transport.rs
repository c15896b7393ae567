//! WebSocket transport for the analysis event stream.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use shared_types::TransportError;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::ports::{Transport, TransportConnection, TransportFrame};

/// Opens event connections with tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn TransportConnection>, TransportError> {
        let (stream, response) =
            connect_async(url)
                .await
                .map_err(|e| TransportError::ConnectFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

        debug!(url, status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportConnection for WsConnection {
    async fn next_frame(&mut self) -> Result<TransportFrame, TransportError> {
        loop {
            let msg = match self.stream.next().await {
                None | Some(Err(WsError::ConnectionClosed)) => {
                    return Ok(TransportFrame::Closed {
                        code: None,
                        reason: String::new(),
                    })
                }
                Some(Err(e)) => {
                    return Err(TransportError::ConnectionLost {
                        reason: e.to_string(),
                    })
                }
                Some(Ok(msg)) => msg,
            };

            match msg {
                Message::Text(text) => return Ok(TransportFrame::Text(text.as_str().to_owned())),
                Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(TransportFrame::Text(text)),
                    Err(_) => {
                        debug!(len = data.len(), "Dropping non-UTF-8 binary frame");
                    }
                },
                Message::Ping(data) => {
                    self.stream.send(Message::Pong(data)).await.map_err(|e| {
                        TransportError::ConnectionLost {
                            reason: e.to_string(),
                        }
                    })?;
                }
                Message::Close(frame) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str().to_owned()),
                        None => (None, String::new()),
                    };
                    return Ok(TransportFrame::Closed { code, reason });
                }
                Message::Pong(_) | Message::Frame(_) => trace!("Ignoring control frame"),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            trace!(error = %e, "Error closing WebSocket");
        }
    }
}
