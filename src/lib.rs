pub mod core;
pub mod exchanges;

pub use core::config::{ExchangeConfig, NegotiationPolicy, StreamConfig};
pub use core::errors::ExchangeError;
pub use exchanges::eunion::{
    EunionAuth, EunionBuilder, EunionUserStreamDataSource, EunionUserStreamTracker, StreamState,
};
