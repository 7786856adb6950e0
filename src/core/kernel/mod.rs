//! Kernel - exchange-agnostic transport, signing and retry primitives
//!
//! # Architecture
//!
//! ## Transport Layer
//! - `WsSession`: one live WebSocket connection (send, receive, close)
//! - `WsConnector`: hands out a fresh, connected session per attempt
//! - `TungsteniteWs` / `TungsteniteConnector`: the production implementation
//!
//! ## Authentication
//! - `Signer`: pluggable request signing interface
//! - `encode_query`, `hmac_sha256_base64`, `sha1_hex`: canonical building blocks
//!
//! ## Message Handling
//! - `WsCodec`: exchange-specific message encoding/decoding
//!
//! ## Testing
//! - `mock`: scripted in-memory `WsConnector`/`WsSession` pair (`test-utils` feature)
//!
//! ## Recovery
//! - `Backoff`: capped exponential delay with jitter between reconnects
//!
//! # Example
//! ```rust,no_run
//! use eunion_stream::core::kernel::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = TungsteniteConnector::new(
//!     "wss://api.eunion.pro/ws/v2".to_string(),
//!     "eunion".to_string(),
//! );
//! let mut session = connector.connect().await?;
//! if let Some(frame) = session.next_raw().await {
//!     println!("first frame: {:?}", frame?);
//! }
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod codec;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod signer;
pub mod ws;

// Re-export key types for convenience
pub use backoff::{Backoff, BackoffConfig};
pub use codec::WsCodec;
pub use signer::{
    encode_query, hmac_sha256_base64, sha1_hex, SignatureResult, SignedRequest, Signer,
};
pub use ws::{TungsteniteConnector, TungsteniteWs, WsConfig, WsConnector, WsSession};
