use crate::core::config::NegotiationPolicy;
use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::signer::Signer;
use crate::core::kernel::ws::WsSession;
use crate::exchanges::eunion::codec::{EunionCodec, EunionMessage};
use crate::exchanges::eunion::types::NegotiationResponse;
use crate::exchanges::eunion::{EUNION_WS_PATH, EXCHANGE_NAME};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, trace, warn};

/// One authenticated connection to the private user stream.
///
/// Drives a single socket through auth, subscribe and streaming. It is
/// never reused: after any failure the owner closes it and builds a new
/// one around a fresh socket.
pub struct EunionSession<S: WsSession> {
    ws: S,
    codec: EunionCodec,
    signer: Arc<dyn Signer>,
    policy: NegotiationPolicy,
    handshake_timeout: Option<Duration>,
    last_recv_time: Arc<AtomicU64>,
}

impl<S: WsSession> EunionSession<S> {
    pub fn new(ws: S, signer: Arc<dyn Signer>) -> Self {
        Self {
            ws,
            codec: EunionCodec::new(),
            signer,
            policy: NegotiationPolicy::default(),
            handshake_timeout: None,
            last_recv_time: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_policy(mut self, policy: NegotiationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Share the "last frame received" clock with the owner
    pub fn with_last_recv_time(mut self, last_recv_time: Arc<AtomicU64>) -> Self {
        self.last_recv_time = last_recv_time;
        self
    }

    /// Milliseconds since the epoch at which the last frame arrived, 0 if none
    pub fn last_recv_time(&self) -> u64 {
        self.last_recv_time.load(Ordering::Relaxed)
    }

    /// Send the signed `auth` request and wait for its single answer
    #[instrument(skip(self), fields(exchange = EXCHANGE_NAME))]
    pub async fn authenticate(&mut self) -> Result<NegotiationResponse, ExchangeError> {
        let signed = self.signer.sign_ws_auth("GET", EUNION_WS_PATH)?;
        let request = self.codec.encode_auth(signed)?;
        self.ws.send_raw(request).await?;

        let response = self.await_response().await?;
        self.check_response("auth", response)
    }

    /// Send a `sub` request for `topic` and wait for its single answer
    #[instrument(skip(self), fields(exchange = EXCHANGE_NAME))]
    pub async fn subscribe(&mut self, topic: &str) -> Result<NegotiationResponse, ExchangeError> {
        let request = self.codec.encode_subscription(topic)?;
        self.ws.send_raw(request).await?;

        let response = self.await_response().await?;
        self.check_response(topic, response)
    }

    /// Next business message from the stream.
    ///
    /// Keep-alive pings are answered in place and never returned. Non-text
    /// and undecodable frames are skipped. Returns `None` once the remote
    /// has closed the socket.
    pub async fn next_message(&mut self) -> Option<Result<Value, ExchangeError>> {
        loop {
            let frame = match self.ws.next_raw().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(e)),
            };

            let message = match self.codec.decode_message(frame) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    warn!(exchange = EXCHANGE_NAME, error = %e, "Skipping undecodable frame");
                    continue;
                }
            };
            self.touch();

            match message {
                EunionMessage::Ping { data } => {
                    trace!(exchange = EXCHANGE_NAME, "Answering keep-alive ping");
                    if let Err(e) = self.reply_pong(data).await {
                        return Some(Err(e));
                    }
                }
                EunionMessage::AuthResponse(response)
                | EunionMessage::SubscribeResponse(response) => {
                    debug!(
                        exchange = EXCHANGE_NAME,
                        ?response,
                        "Ignoring late negotiation response"
                    );
                }
                EunionMessage::Business(value) => {
                    trace!(
                        exchange = EXCHANGE_NAME,
                        message = %value,
                        "Received user stream message"
                    );
                    return Some(Ok(value));
                }
            }
        }
    }

    /// Close the underlying socket
    pub async fn close(&mut self) -> Result<(), ExchangeError> {
        self.ws.close().await
    }

    async fn await_response(&mut self) -> Result<NegotiationResponse, ExchangeError> {
        match self.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, self.read_response())
                .await
                .map_err(|_| {
                    ExchangeError::ConnectionTimeout(format!(
                        "No handshake response within {:?}",
                        limit
                    ))
                })?,
            None => self.read_response().await,
        }
    }

    async fn read_response(&mut self) -> Result<NegotiationResponse, ExchangeError> {
        loop {
            let frame = self
                .ws
                .next_raw()
                .await
                .ok_or(ExchangeError::ConnectionClosed)??;

            let Some(message) = self.codec.decode_message(frame)? else {
                continue;
            };
            self.touch();

            match message {
                EunionMessage::Ping { data } => self.reply_pong(data).await?,
                other => return other.into_response(),
            }
        }
    }

    fn check_response(
        &self,
        channel: &str,
        response: NegotiationResponse,
    ) -> Result<NegotiationResponse, ExchangeError> {
        if response.is_success() {
            info!(exchange = EXCHANGE_NAME, channel, "Negotiation succeeded");
            return Ok(response);
        }

        error!(
            exchange = EXCHANGE_NAME,
            channel,
            code = response.code,
            message = ?response.message,
            "Negotiation failed"
        );

        match self.policy {
            NegotiationPolicy::LogOnly => Ok(response),
            NegotiationPolicy::Escalate => Err(ExchangeError::NegotiationFailed {
                channel: channel.to_string(),
                code: response.code,
                message: response.message.unwrap_or_default(),
            }),
        }
    }

    async fn reply_pong(&mut self, data: Value) -> Result<(), ExchangeError> {
        let pong = self.codec.encode_pong(data)?;
        self.ws.send_raw(pong).await
    }

    fn touch(&self) {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default();
        self.last_recv_time.store(now, Ordering::Relaxed);
    }
}
