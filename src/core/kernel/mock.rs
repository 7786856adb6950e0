//! Scripted in-memory transport.
//!
//! `MockWsConnector` hands out `MockWsSession`s that replay a fixed list of
//! inbound frames and record everything sent, so session and supervisor
//! behaviour can be driven without a network.

use crate::core::errors::ExchangeError;
use crate::core::kernel::ws::{WsConnector, WsSession};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_tungstenite::tungstenite::Message;

/// One step of an inbound script
#[derive(Debug, Clone)]
pub enum ScriptedFrame {
    Frame(Message),
    /// Receive fails with a network error
    Error(String),
    /// Receive never completes
    Hang,
}

impl ScriptedFrame {
    pub fn text(text: &str) -> Self {
        Self::Frame(Message::Text(text.to_string()))
    }
}

/// What the connector does on one `connect` call
#[derive(Debug, Clone)]
pub enum ConnectScript {
    Session(Vec<ScriptedFrame>),
    Fail(String),
    /// `connect` never completes
    Hang,
}

/// Counters shared by a connector and every session it created
#[derive(Debug, Default)]
pub struct MockWsStats {
    connects: AtomicUsize,
    closes: AtomicUsize,
    sent: Mutex<Vec<(usize, Message)>>,
}

impl MockWsStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Outbound frames as `(session index, message)`, session index starting at 0
    pub fn sent(&self) -> Vec<(usize, Message)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Outbound text frames, in send order
    pub fn sent_text(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|(_, message)| match message {
                Message::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

pub struct MockWsSession {
    index: usize,
    frames: VecDeque<ScriptedFrame>,
    stats: Arc<MockWsStats>,
    connected: bool,
}

impl MockWsSession {
    pub fn new(frames: Vec<ScriptedFrame>, stats: Arc<MockWsStats>) -> Self {
        Self {
            index: 0,
            frames: frames.into(),
            stats,
            connected: true,
        }
    }
}

#[async_trait]
impl WsSession for MockWsSession {
    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError> {
        if !self.connected {
            return Err(ExchangeError::NetworkError(
                "WebSocket not connected".to_string(),
            ));
        }
        self.stats
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((self.index, msg));
        Ok(())
    }

    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>> {
        match self.frames.pop_front()? {
            ScriptedFrame::Frame(message) => Some(Ok(message)),
            ScriptedFrame::Error(reason) => {
                self.connected = false;
                Some(Err(ExchangeError::NetworkError(reason)))
            }
            ScriptedFrame::Hang => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), ExchangeError> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Replays one [`ConnectScript`] per `connect` call.
///
/// Once the scripts run out every further session hangs on its first
/// receive, which parks a supervisor until it is cancelled.
#[derive(Debug, Default)]
pub struct MockWsConnector {
    scripts: Mutex<VecDeque<ConnectScript>>,
    stats: Arc<MockWsStats>,
}

impl MockWsConnector {
    pub fn new(scripts: Vec<ConnectScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            stats: Arc::new(MockWsStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<MockWsStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl WsConnector for MockWsConnector {
    type Session = MockWsSession;

    async fn connect(&self) -> Result<Self::Session, ExchangeError> {
        let index = self.stats.connects.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| ConnectScript::Session(vec![ScriptedFrame::Hang]));

        match script {
            ConnectScript::Session(frames) => {
                let mut session = MockWsSession::new(frames, self.stats.clone());
                session.index = index;
                Ok(session)
            }
            ConnectScript::Fail(reason) => Err(ExchangeError::NetworkError(reason)),
            ConnectScript::Hang => std::future::pending().await,
        }
    }
}
