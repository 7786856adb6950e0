use crate::core::errors::ExchangeError;
use tokio_tungstenite::tungstenite::Message;

/// Codec trait for handling exchange-specific WebSocket message encoding/decoding
///
/// This trait defines the contract for converting between raw WebSocket messages
/// and exchange-specific typed messages. Each exchange should implement this trait
/// to handle their specific message formats.
pub trait WsCodec: Send + Sync + 'static {
    /// The type representing parsed messages from this exchange
    type Message: Send + Sync;

    /// Encode a subscription request for a single topic
    fn encode_subscription(&self, topic: &str) -> Result<Message, ExchangeError>;

    /// Decode a raw WebSocket message into a typed message
    ///
    /// # Returns
    /// - `Ok(Some(message))` - Successfully decoded message
    /// - `Ok(None)` - Frame carries nothing for this codec (non-text frames)
    /// - `Err(error)` - Failed to decode message
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError>;
}
