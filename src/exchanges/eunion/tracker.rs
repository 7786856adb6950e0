use crate::core::config::StreamConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::ws::{TungsteniteConnector, WsConnector};
use crate::exchanges::eunion::signer::EunionAuth;
use crate::exchanges::eunion::user_stream::{EunionUserStreamDataSource, StreamState};
use crate::exchanges::eunion::EXCHANGE_NAME;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns the user stream data source and the queue it feeds.
///
/// Downstream code takes the receiving half once via
/// [`take_user_stream`](Self::take_user_stream) and reads decoded messages
/// in arrival order.
pub struct EunionUserStreamTracker<C: WsConnector = TungsteniteConnector> {
    data_source: Arc<EunionUserStreamDataSource<C>>,
    user_stream_tx: mpsc::UnboundedSender<Value>,
    user_stream_rx: Option<mpsc::UnboundedReceiver<Value>>,
}

impl EunionUserStreamTracker<TungsteniteConnector> {
    pub fn new(auth: EunionAuth, config: StreamConfig) -> Self {
        Self::from_data_source(EunionUserStreamDataSource::new(auth, config))
    }
}

impl<C: WsConnector + 'static> EunionUserStreamTracker<C> {
    pub fn from_data_source(data_source: EunionUserStreamDataSource<C>) -> Self {
        let (user_stream_tx, user_stream_rx) = mpsc::unbounded_channel();
        Self {
            data_source: Arc::new(data_source),
            user_stream_tx,
            user_stream_rx: Some(user_stream_rx),
        }
    }

    pub fn exchange_name(&self) -> &'static str {
        EXCHANGE_NAME
    }

    pub fn data_source(&self) -> &Arc<EunionUserStreamDataSource<C>> {
        &self.data_source
    }

    /// Receiving half of the output queue; `None` after the first call
    pub fn take_user_stream(&mut self) -> Option<mpsc::UnboundedReceiver<Value>> {
        self.user_stream_rx.take()
    }

    /// See [`EunionUserStreamDataSource::last_recv_time`]
    pub fn last_recv_time(&self) -> u64 {
        self.data_source.last_recv_time()
    }

    pub fn state(&self) -> StreamState {
        self.data_source.state()
    }

    /// Run the stream on the current task until `cancel` fires
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), ExchangeError> {
        self.data_source
            .listen_for_user_stream(self.user_stream_tx.clone(), cancel)
            .await
    }

    /// Run the stream on a background task until `cancel` fires
    pub fn spawn(&self, cancel: CancellationToken) -> JoinHandle<Result<(), ExchangeError>> {
        let data_source = self.data_source.clone();
        let output = self.user_stream_tx.clone();
        tokio::spawn(async move { data_source.listen_for_user_stream(output, cancel).await })
    }
}
