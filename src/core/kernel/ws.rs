use crate::core::errors::ExchangeError;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, instrument, warn};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// WebSocket transport configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000, // 10 seconds
        }
    }
}

/// One live WebSocket connection - pure transport layer
///
/// A session is handed out already connected by a [`WsConnector`] and is
/// never reconnected in place; the owner drops it after `close`.
#[async_trait]
pub trait WsSession: Send {
    /// Send a raw message
    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError>;

    /// Receive the next raw message; `None` once the remote has gone away
    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>>;

    /// Close the connection and release the socket
    async fn close(&mut self) -> Result<(), ExchangeError>;

    /// Check if the connection is alive
    fn is_connected(&self) -> bool;
}

/// Factory for fresh sessions, one per connection attempt
#[async_trait]
pub trait WsConnector: Send + Sync {
    type Session: WsSession + 'static;

    async fn connect(&self) -> Result<Self::Session, ExchangeError>;
}

/// Tungstenite-based WebSocket session
pub struct TungsteniteWs {
    url: String,
    write: Option<WsSink>,
    read: Option<WsStream>,
    connected: bool,
    exchange_name: String,
    config: WsConfig,
}

impl TungsteniteWs {
    /// Create a new, not yet connected WebSocket session
    ///
    /// # Arguments
    /// * `url` - The WebSocket URL to connect to
    /// * `exchange_name` - Name of the exchange for logging/tracing
    pub fn new(url: String, exchange_name: String) -> Self {
        Self {
            url,
            write: None,
            read: None,
            connected: false,
            exchange_name,
            config: WsConfig::default(),
        }
    }

    /// Set custom WebSocket configuration
    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }

    /// Open the transport to the configured endpoint
    #[instrument(skip(self), fields(exchange = %self.exchange_name, url = %self.url))]
    pub async fn connect(&mut self) -> Result<(), ExchangeError> {
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);

        let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(&self.url))
            .await
            .map_err(|_| {
                ExchangeError::ConnectionTimeout("WebSocket connection timeout".to_string())
            })?
            .map_err(|e| {
                ExchangeError::NetworkError(format!("WebSocket connection failed: {}", e))
            })?;

        let (write, read) = ws_stream.split();
        self.write = Some(write);
        self.read = Some(read);
        self.connected = true;

        debug!("WebSocket connected");
        Ok(())
    }
}

#[async_trait]
impl WsSession for TungsteniteWs {
    #[instrument(skip(self, msg), fields(exchange = %self.exchange_name))]
    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError> {
        if !self.connected {
            return Err(ExchangeError::NetworkError(
                "WebSocket not connected".to_string(),
            ));
        }

        let write = self.write.as_mut().ok_or_else(|| {
            ExchangeError::NetworkError("WebSocket write stream not available".to_string())
        })?;

        if let Err(e) = write.send(msg).await {
            self.connected = false;
            return Err(ExchangeError::NetworkError(format!(
                "Failed to send WebSocket message: {}",
                e
            )));
        }

        Ok(())
    }

    #[instrument(skip(self), fields(exchange = %self.exchange_name))]
    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>> {
        if !self.connected {
            return Some(Err(ExchangeError::NetworkError(
                "WebSocket not connected".to_string(),
            )));
        }

        loop {
            let read = self.read.as_mut()?;

            match read.next().await {
                Some(Ok(Message::Ping(data))) => {
                    // Protocol-level pings are answered here; the exchange's
                    // JSON keep-alive is handled by the session layer.
                    if let Err(e) = self.send_raw(Message::Pong(data)).await {
                        warn!("Failed to send pong response: {}", e);
                    }
                }
                Some(Ok(Message::Pong(_))) => {}
                Some(Ok(message)) => {
                    if matches!(message, Message::Close(_)) {
                        self.connected = false;
                    }
                    return Some(Ok(message));
                }
                Some(Err(e)) => {
                    self.connected = false;
                    return Some(Err(ExchangeError::NetworkError(format!(
                        "WebSocket error: {}",
                        e
                    ))));
                }
                None => {
                    self.connected = false;
                    return None;
                }
            }
        }
    }

    #[instrument(skip(self), fields(exchange = %self.exchange_name))]
    async fn close(&mut self) -> Result<(), ExchangeError> {
        if let Some(write) = self.write.as_mut() {
            // Best effort: the peer may already be gone.
            let _ = write.send(Message::Close(None)).await;
            let _ = write.close().await;
        }
        self.connected = false;
        self.write = None;
        self.read = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Opens a new [`TungsteniteWs`] against a fixed endpoint on every call
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    url: String,
    exchange_name: String,
    config: WsConfig,
}

impl TungsteniteConnector {
    pub fn new(url: String, exchange_name: String) -> Self {
        Self {
            url,
            exchange_name,
            config: WsConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl WsConnector for TungsteniteConnector {
    type Session = TungsteniteWs;

    async fn connect(&self) -> Result<Self::Session, ExchangeError> {
        let mut ws = TungsteniteWs::new(self.url.clone(), self.exchange_name.clone())
            .with_config(self.config.clone());
        ws.connect().await?;
        Ok(ws)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let mut ws = TungsteniteWs::new("ws://127.0.0.1:1".to_string(), "test".to_string());
        assert!(!ws.is_connected());

        let result = ws.send_raw(Message::Text("{}".to_string())).await;
        assert!(matches!(result, Err(ExchangeError::NetworkError(_))));
        assert!(matches!(
            ws.next_raw().await,
            Some(Err(ExchangeError::NetworkError(_)))
        ));
    }

    #[tokio::test]
    async fn test_close_without_connection_is_noop() {
        let mut ws = TungsteniteWs::new("ws://127.0.0.1:1".to_string(), "test".to_string());
        assert!(ws.close().await.is_ok());
        assert!(!ws.is_connected());
    }

    #[tokio::test]
    async fn test_connector_reports_unreachable_endpoint() {
        // Port 1 on loopback refuses connections
        let connector =
            TungsteniteConnector::new("ws://127.0.0.1:1".to_string(), "test".to_string())
                .with_config(WsConfig {
                    connect_timeout_ms: 2_000,
                });

        let result = connector.connect().await;
        assert!(matches!(
            result,
            Err(ExchangeError::NetworkError(_) | ExchangeError::ConnectionTimeout(_))
        ));
    }
}
