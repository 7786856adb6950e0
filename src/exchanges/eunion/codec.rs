use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::signer::SignedRequest;
use crate::exchanges::eunion::types::{
    EunionAuthRequest, EunionPong, EunionSubscribeRequest, NegotiationResponse,
};
use serde::Serialize;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

/// Eunion user stream message types
#[derive(Debug, Clone, PartialEq)]
pub enum EunionMessage {
    /// Keep-alive probe; must be echoed back as a pong
    Ping { data: Value },
    /// Answer to the `req`/`auth` handshake
    AuthResponse(NegotiationResponse),
    /// Answer to a `sub` request
    SubscribeResponse(NegotiationResponse),
    /// Anything else, forwarded to the consumer untouched
    Business(Value),
}

impl EunionMessage {
    /// Read a handshake answer out of this frame.
    ///
    /// Bare `{"code":...}` frames carry no discriminator and arrive as
    /// `Business`; they are accepted as long as they have a code.
    pub fn into_response(self) -> Result<NegotiationResponse, ExchangeError> {
        match self {
            Self::AuthResponse(response) | Self::SubscribeResponse(response) => Ok(response),
            Self::Business(value) => serde_json::from_value(value).map_err(|e| {
                ExchangeError::ParseError(format!("Expected a response frame: {}", e))
            }),
            Self::Ping { .. } => Err(ExchangeError::ParseError(
                "Expected a response frame, got ping".to_string(),
            )),
        }
    }
}

/// Eunion WebSocket codec implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct EunionCodec;

impl EunionCodec {
    pub const fn new() -> Self {
        Self
    }

    pub fn encode_auth(&self, signed: SignedRequest) -> Result<Message, ExchangeError> {
        Self::encode_json(&EunionAuthRequest::new(signed))
    }

    pub fn encode_pong(&self, data: Value) -> Result<Message, ExchangeError> {
        Self::encode_json(&EunionPong::new(data))
    }

    fn encode_json<T: Serialize>(value: &T) -> Result<Message, ExchangeError> {
        Ok(Message::Text(serde_json::to_string(value)?))
    }

    /// Classify one decoded JSON value
    pub fn classify(value: Value) -> EunionMessage {
        let action = value.get("action").and_then(Value::as_str);
        let has_code = value.get("code").is_some();

        match action {
            Some("ping") => {
                let data = value.get("data").cloned().unwrap_or(Value::Null);
                return EunionMessage::Ping { data };
            }
            Some("req") if has_code => {
                if let Ok(response) = serde_json::from_value(value.clone()) {
                    return EunionMessage::AuthResponse(response);
                }
            }
            Some("sub") if has_code => {
                if let Ok(response) = serde_json::from_value(value.clone()) {
                    return EunionMessage::SubscribeResponse(response);
                }
            }
            _ => {}
        }

        EunionMessage::Business(value)
    }
}

impl WsCodec for EunionCodec {
    type Message = EunionMessage;

    fn encode_subscription(&self, topic: &str) -> Result<Message, ExchangeError> {
        Self::encode_json(&EunionSubscribeRequest::new(topic))
    }

    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError> {
        let Message::Text(text) = message else {
            return Ok(None);
        };

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| ExchangeError::ParseError(format!("Failed to parse JSON: {}", e)))?;

        Ok(Some(Self::classify(value)))
    }
}
