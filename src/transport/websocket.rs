use super::{TransportFactory, TransportSink, TransportStream};
use crate::types::error::Result;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport factory backed by tokio-tungstenite.
pub struct WebSocketFactory;

#[async_trait]
impl TransportFactory for WebSocketFactory {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn TransportSink>, Box<dyn TransportStream>)> {
        tracing::debug!("opening WebSocket connection");
        let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write_half, read_half) = stream.split();

        Ok((
            Box::new(WebSocketSink { inner: write_half }),
            Box::new(WebSocketReader { inner: read_half }),
        ))
    }
}

struct WebSocketSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl TransportSink for WebSocketSink {
    async fn send(&mut self, text: String) -> Result<()> {
        self.inner.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await?;
        Ok(())
    }
}

struct WebSocketReader {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl TransportStream for WebSocketReader {
    async fn next(&mut self) -> Option<Result<String>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    match frame {
                        Some(frame) => tracing::info!(
                            "server closed connection: code={:?}, reason='{}'",
                            frame.code,
                            frame.reason
                        ),
                        None => tracing::info!("server closed connection without close frame"),
                    }
                    return None;
                }
                Ok(Message::Ping(data)) => {
                    tracing::debug!("received transport-level ping ({} bytes)", data.len());
                }
                Ok(Message::Pong(data)) => {
                    tracing::debug!("received transport-level pong ({} bytes)", data.len());
                }
                Ok(Message::Binary(data)) => {
                    tracing::warn!("ignoring unexpected binary message ({} bytes)", data.len());
                }
                Ok(Message::Frame(_)) => {
                    tracing::debug!("received raw frame (internal)");
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
