use crate::core::config::StreamConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::backoff::Backoff;
use crate::core::kernel::signer::Signer;
use crate::core::kernel::ws::{TungsteniteConnector, WsConnector};
use crate::exchanges::eunion::session::EunionSession;
use crate::exchanges::eunion::signer::EunionAuth;
use crate::exchanges::eunion::{EUNION_WS_ENDPOINT, EXCHANGE_NAME};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where the supervisor currently is in its connect/stream cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Authenticating,
    Subscribing,
    Streaming,
    Closing,
    Terminated,
}

/// Supervises the private user stream.
///
/// Each iteration opens a fresh connection, authenticates, subscribes to
/// every configured topic and forwards business messages to the output
/// queue. Any failure closes the connection and starts over after a backoff
/// delay. Only cancellation ends the loop.
///
/// At most one loop runs per data source, so there is never more than one
/// live connection.
pub struct EunionUserStreamDataSource<C: WsConnector = TungsteniteConnector> {
    connector: C,
    signer: Arc<dyn Signer>,
    config: StreamConfig,
    last_recv_time: Arc<AtomicU64>,
    state: watch::Sender<StreamState>,
    running: AtomicBool,
}

/// Marks a data source as running; cleared on drop, including when the
/// supervisor future is dropped mid-flight.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool) -> Option<Self> {
        if running.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Self(running))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl EunionUserStreamDataSource<TungsteniteConnector> {
    /// Data source against the production streaming endpoint
    pub fn new(auth: EunionAuth, config: StreamConfig) -> Self {
        Self::with_endpoint(auth, config, EUNION_WS_ENDPOINT.to_string())
    }

    pub fn with_endpoint(auth: EunionAuth, config: StreamConfig, ws_url: String) -> Self {
        let connector = TungsteniteConnector::new(ws_url, EXCHANGE_NAME.to_string())
            .with_config(config.ws.clone());
        Self::with_connector(connector, Arc::new(auth), config)
    }
}

impl<C: WsConnector> EunionUserStreamDataSource<C> {
    pub fn with_connector(connector: C, signer: Arc<dyn Signer>, config: StreamConfig) -> Self {
        let (state, _) = watch::channel(StreamState::Idle);
        Self {
            connector,
            signer,
            config,
            last_recv_time: Arc::new(AtomicU64::new(0)),
            state,
            running: AtomicBool::new(false),
        }
    }

    /// Milliseconds since the epoch of the last received frame, 0 before the
    /// first one. Stays stale while the stream is down.
    pub fn last_recv_time(&self) -> u64 {
        self.last_recv_time.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Whether a supervisor loop is currently running on this data source
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run the stream until `cancel` fires.
    ///
    /// Business messages are pushed to `output` in arrival order. Returns
    /// `Err(ExchangeError::Cancelled)` after cancellation, once the live
    /// connection (if any) has been closed; every other error is logged and
    /// followed by a reconnect.
    ///
    /// Fails with `Err(ExchangeError::AlreadyRunning)` without touching the
    /// network if another loop is already running on this data source.
    pub async fn listen_for_user_stream(
        &self,
        output: mpsc::UnboundedSender<Value>,
        cancel: CancellationToken,
    ) -> Result<(), ExchangeError> {
        let Some(_run) = RunGuard::acquire(&self.running) else {
            warn!(exchange = EXCHANGE_NAME, "User stream is already running");
            return Err(ExchangeError::AlreadyRunning);
        };

        let mut backoff = Backoff::new(self.config.backoff.clone());

        loop {
            if cancel.is_cancelled() {
                return Err(self.terminate());
            }

            self.set_state(StreamState::Connecting);
            info!(
                exchange = EXCHANGE_NAME,
                attempt = backoff.attempt(),
                "Connecting to user stream"
            );

            let connected = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.terminate()),
                result = self.connector.connect() => result,
            };

            let outcome = match connected {
                Ok(ws) => {
                    let mut session = EunionSession::new(ws, self.signer.clone())
                        .with_policy(self.config.negotiation_policy)
                        .with_handshake_timeout(self.config.handshake_timeout)
                        .with_last_recv_time(self.last_recv_time.clone());

                    let outcome = tokio::select! {
                        biased;
                        () = cancel.cancelled() => Err(ExchangeError::Cancelled),
                        result = self.run_session(&mut session, &output, &mut backoff) => result,
                    };

                    self.set_state(StreamState::Closing);
                    if let Err(e) = session.close().await {
                        warn!(
                            exchange = EXCHANGE_NAME,
                            error = %e,
                            "Error closing user stream connection"
                        );
                    }
                    outcome
                }
                Err(e) => Err(e),
            };

            match outcome {
                Err(ExchangeError::Cancelled) => return Err(self.terminate()),
                Err(e) => {
                    error!(
                        exchange = EXCHANGE_NAME,
                        error = %e,
                        "User stream failed, reconnecting"
                    );
                }
                Ok(()) => {}
            }

            let delay = backoff.next_delay();
            debug!(
                exchange = EXCHANGE_NAME,
                delay_ms = delay.as_millis() as u64,
                "Waiting before reconnect"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.terminate()),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn run_session(
        &self,
        session: &mut EunionSession<C::Session>,
        output: &mpsc::UnboundedSender<Value>,
        backoff: &mut Backoff,
    ) -> Result<(), ExchangeError> {
        self.set_state(StreamState::Authenticating);
        session.authenticate().await?;

        self.set_state(StreamState::Subscribing);
        for topic in &self.config.topics {
            session.subscribe(topic).await?;
        }

        self.set_state(StreamState::Streaming);
        backoff.reset();

        while let Some(message) = session.next_message().await {
            if output.send(message?).is_err() {
                warn!(exchange = EXCHANGE_NAME, "User stream consumer is gone, dropping message");
            }
        }

        Err(ExchangeError::ConnectionClosed)
    }

    fn set_state(&self, state: StreamState) {
        self.state.send_replace(state);
    }

    fn terminate(&self) -> ExchangeError {
        info!(exchange = EXCHANGE_NAME, "User stream cancelled");
        self.set_state(StreamState::Terminated);
        ExchangeError::Cancelled
    }
}
