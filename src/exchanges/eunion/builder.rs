use crate::core::config::{ExchangeConfig, NegotiationPolicy, StreamConfig};
use crate::core::errors::ExchangeError;
use crate::core::kernel::backoff::BackoffConfig;
use crate::exchanges::eunion::signer::EunionAuth;
use crate::exchanges::eunion::tracker::EunionUserStreamTracker;
use crate::exchanges::eunion::user_stream::EunionUserStreamDataSource;
use crate::exchanges::eunion::EUNION_WS_ENDPOINT;
use std::time::Duration;

/// Builder for the Eunion user stream
///
/// Credentials come from an [`ExchangeConfig`]; everything that shapes the
/// stream itself (topics, backoff, negotiation policy) from a
/// [`StreamConfig`].
pub struct EunionBuilder {
    config: ExchangeConfig,
    stream_config: StreamConfig,
    hostname: Option<String>,
}

impl Default for EunionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EunionBuilder {
    pub fn new() -> Self {
        Self {
            config: ExchangeConfig::new(String::new(), String::new()),
            stream_config: StreamConfig::default(),
            hostname: None,
        }
    }

    /// Set the exchange configuration
    pub fn with_config(mut self, config: ExchangeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set API credentials
    pub fn with_credentials(mut self, api_key: String, secret_key: String) -> Self {
        let ws_url = self.config.ws_url.take();
        self.config = ExchangeConfig::new(api_key, secret_key);
        self.config.ws_url = ws_url;
        self
    }

    pub fn with_stream_config(mut self, stream_config: StreamConfig) -> Self {
        self.stream_config = stream_config;
        self
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.stream_config.topics = topics;
        self
    }

    pub fn with_negotiation_policy(mut self, policy: NegotiationPolicy) -> Self {
        self.stream_config.negotiation_policy = policy;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.stream_config.backoff = backoff;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_config.handshake_timeout = timeout;
        self
    }

    /// Set the streaming endpoint
    pub fn with_ws_url(mut self, ws_url: String) -> Self {
        self.config.ws_url = Some(ws_url);
        self
    }

    /// Host name used in the signed payload, for deployments behind a proxy
    pub fn with_hostname(mut self, hostname: String) -> Self {
        self.hostname = Some(hostname);
        self
    }

    fn ws_url(&self) -> String {
        self.config
            .ws_url
            .clone()
            .unwrap_or_else(|| EUNION_WS_ENDPOINT.to_string())
    }

    fn auth(&self) -> Result<EunionAuth, ExchangeError> {
        let auth = EunionAuth::from_config(&self.config)?;
        Ok(match &self.hostname {
            Some(hostname) => auth.with_hostname(hostname.clone()),
            None => auth,
        })
    }

    pub fn build_data_source(self) -> Result<EunionUserStreamDataSource, ExchangeError> {
        let auth = self.auth()?;
        let ws_url = self.ws_url();
        Ok(EunionUserStreamDataSource::with_endpoint(
            auth,
            self.stream_config,
            ws_url,
        ))
    }

    pub fn build_tracker(self) -> Result<EunionUserStreamTracker, ExchangeError> {
        Ok(EunionUserStreamTracker::from_data_source(
            self.build_data_source()?,
        ))
    }
}

/// Build a user stream tracker with default stream settings
pub fn build_tracker(config: ExchangeConfig) -> Result<EunionUserStreamTracker, ExchangeError> {
    EunionBuilder::new().with_config(config).build_tracker()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigError;

    #[test]
    fn test_build_requires_credentials() {
        let result = EunionBuilder::new().build_data_source();
        assert!(matches!(
            result,
            Err(ExchangeError::ConfigError(
                ConfigError::InvalidConfiguration(_)
            ))
        ));
    }

    #[test]
    fn test_builder_applies_stream_settings() {
        let data_source = EunionBuilder::new()
            .with_ws_url("wss://localhost:9443/ws/v2".to_string())
            .with_credentials("K".to_string(), "S".to_string())
            .with_topics(vec!["orders#btcusdt".to_string()])
            .with_negotiation_policy(NegotiationPolicy::Escalate)
            .with_handshake_timeout(None)
            .build_data_source()
            .unwrap();

        let config = data_source.config();
        assert_eq!(config.topics, vec!["orders#btcusdt"]);
        assert_eq!(config.negotiation_policy, NegotiationPolicy::Escalate);
        assert!(config.handshake_timeout.is_none());
    }

    #[test]
    fn test_ws_url_defaults_to_production_endpoint() {
        let builder =
            EunionBuilder::new().with_config(ExchangeConfig::new("K".to_string(), "S".to_string()));
        assert_eq!(builder.ws_url(), EUNION_WS_ENDPOINT);

        let builder = builder.with_ws_url("wss://localhost/ws/v2".to_string());
        assert_eq!(builder.ws_url(), "wss://localhost/ws/v2");
    }

    #[test]
    fn test_hostname_override() {
        let builder = EunionBuilder::new()
            .with_credentials("K".to_string(), "S".to_string())
            .with_hostname("proxy.internal".to_string());
        assert_eq!(builder.auth().unwrap().hostname(), "proxy.internal");
    }

    #[test]
    fn test_build_tracker_from_config() {
        let mut tracker =
            build_tracker(ExchangeConfig::new("K".to_string(), "S".to_string())).unwrap();
        assert_eq!(tracker.exchange_name(), "eunion");
        assert!(tracker.take_user_stream().is_some());
    }
}
