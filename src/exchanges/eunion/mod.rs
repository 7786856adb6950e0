pub mod codec;
pub mod signer;
pub mod types;

pub mod builder;
pub mod session;
pub mod tracker;
pub mod user_stream;

pub const EXCHANGE_NAME: &str = "eunion";

pub const EUNION_WS_ENDPOINT: &str = "wss://api.eunion.pro/ws/v2";
/// Path component of the streaming endpoint, part of the signed payload
pub const EUNION_WS_PATH: &str = "/ws/v2";

pub const ORDER_UPDATE_TOPIC: &str = "orders#*";
pub const ACCOUNT_UPDATE_TOPIC: &str = "accounts.update#1";
/// Topics a user stream subscribes to unless configured otherwise
pub const SUBSCRIBE_TOPICS: [&str; 2] = [ORDER_UPDATE_TOPIC, ACCOUNT_UPDATE_TOPIC];

// Re-export main components
pub use builder::{build_tracker, EunionBuilder};
pub use codec::{EunionCodec, EunionMessage};
pub use session::EunionSession;
pub use signer::EunionAuth;
pub use tracker::EunionUserStreamTracker;
pub use types::{EunionAuthRequest, EunionPong, EunionSubscribeRequest, NegotiationResponse};
pub use user_stream::{EunionUserStreamDataSource, StreamState};
