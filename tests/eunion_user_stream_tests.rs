use eunion_stream::core::kernel::backoff::BackoffConfig;
use eunion_stream::core::kernel::mock::{
    ConnectScript, MockWsConnector, MockWsStats, ScriptedFrame,
};
use eunion_stream::exchanges::eunion::{EUNION_WS_PATH, SUBSCRIBE_TOPICS};
use eunion_stream::{
    EunionAuth, EunionUserStreamDataSource, EunionUserStreamTracker, ExchangeError, StreamConfig,
    StreamState,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const OK: &str = r#"{"code":200}"#;

fn create_test_auth() -> EunionAuth {
    EunionAuth::new("K".to_string(), "S".to_string()).unwrap()
}

fn create_tracker(
    scripts: Vec<ConnectScript>,
) -> (EunionUserStreamTracker<MockWsConnector>, Arc<MockWsStats>) {
    let connector = MockWsConnector::new(scripts);
    let stats = connector.stats();
    let config = StreamConfig::default().with_backoff(BackoffConfig::immediate());
    let data_source = EunionUserStreamDataSource::with_connector(
        connector,
        Arc::new(create_test_auth()),
        config,
    );
    (EunionUserStreamTracker::from_data_source(data_source), stats)
}

fn handshake() -> Vec<ScriptedFrame> {
    vec![
        ScriptedFrame::text(OK),
        ScriptedFrame::text(OK),
        ScriptedFrame::text(OK),
    ]
}

async fn recv(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Value>) -> Value {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a user stream message")
        .expect("user stream closed")
}

#[test]
fn test_ws_auth_signature_golden_vector() {
    let signed = create_test_auth()
        .ws_auth_params_at("GET", EUNION_WS_PATH, "2021-03-04T05:06:07")
        .unwrap();
    assert_eq!(signed.signature, "uV6ezlmws7an2XogNAGtfJbOjMBrgVoFiXvxpGk5F+Q=");
}

#[tokio::test]
async fn test_handshake_frames_are_signed_and_ordered() {
    let mut frames = handshake();
    frames.push(ScriptedFrame::Hang);
    let (mut tracker, stats) = create_tracker(vec![ConnectScript::Session(frames)]);
    let _rx = tracker.take_user_stream().unwrap();
    let cancel = CancellationToken::new();
    let handle = tracker.spawn(cancel.clone());

    let mut states = tracker.data_source().subscribe_state();
    timeout(
        Duration::from_secs(5),
        states.wait_for(|state| *state == StreamState::Streaming),
    )
    .await
    .unwrap()
    .unwrap();

    let sent: Vec<Value> = stats
        .sent_text()
        .iter()
        .map(|text| serde_json::from_str(text).unwrap())
        .collect();
    assert_eq!(sent.len(), 3);

    let auth = &sent[0];
    assert_eq!(auth["action"], "req");
    assert_eq!(auth["ch"], "auth");
    assert_eq!(auth["params"]["authType"], "api");
    assert_eq!(auth["params"]["accessKey"], "K");
    assert_eq!(auth["params"]["signatureMethod"], "HmacSHA256");
    assert_eq!(auth["params"]["signatureVersion"], "2.1");

    let timestamp = auth["params"]["timestamp"].as_str().unwrap();
    let expected = create_test_auth()
        .ws_auth_params_at("GET", EUNION_WS_PATH, timestamp)
        .unwrap();
    assert_eq!(auth["params"]["signature"], expected.signature.as_str());

    for (request, topic) in sent[1..].iter().zip(SUBSCRIBE_TOPICS) {
        assert_eq!(request["action"], "sub");
        assert_eq!(request["ch"], topic);
    }

    cancel.cancel();
    assert!(handle.await.unwrap().unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_ping_is_answered_and_business_message_forwarded() {
    let mut frames = handshake();
    frames.push(ScriptedFrame::text(r#"{"action":"ping","data":{"ts":1}}"#));
    frames.push(ScriptedFrame::text(
        r#"{"action":"push","ch":"orders#*","data":{"orderId":42}}"#,
    ));
    frames.push(ScriptedFrame::Hang);
    let (mut tracker, stats) = create_tracker(vec![ConnectScript::Session(frames)]);
    let mut rx = tracker.take_user_stream().unwrap();
    let cancel = CancellationToken::new();
    let handle = tracker.spawn(cancel.clone());

    let message = recv(&mut rx).await;
    assert_eq!(message["data"]["orderId"], 42);
    assert!(tracker.last_recv_time() > 0);

    cancel.cancel();
    assert!(handle.await.unwrap().unwrap_err().is_cancelled());

    // Exactly one message reaches the consumer
    assert!(rx.try_recv().is_err());

    let pongs: Vec<String> = stats
        .sent_text()
        .into_iter()
        .filter(|text| text.contains("pong"))
        .collect();
    assert_eq!(pongs, vec![r#"{"action":"pong","data":{"ts":1}}"#.to_string()]);
}

#[tokio::test]
async fn test_reconnects_after_connect_failure_and_receive_error() {
    let mut broken = handshake();
    broken.push(ScriptedFrame::Error("connection reset by peer".to_string()));

    let mut healthy = handshake();
    healthy.push(ScriptedFrame::text(r#"{"action":"push","ch":"orders#*","seq":7}"#));
    healthy.push(ScriptedFrame::Hang);

    let (mut tracker, stats) = create_tracker(vec![
        ConnectScript::Fail("connection refused".to_string()),
        ConnectScript::Session(broken),
        ConnectScript::Session(healthy),
    ]);
    let mut rx = tracker.take_user_stream().unwrap();
    let cancel = CancellationToken::new();
    let handle = tracker.spawn(cancel.clone());

    let message = recv(&mut rx).await;
    assert_eq!(message["seq"], 7);

    assert_eq!(stats.connects(), 3);
    // The refused attempt never produced a connection to close
    assert_eq!(stats.closes(), 1);

    cancel.cancel();
    assert!(handle.await.unwrap().unwrap_err().is_cancelled());
    assert_eq!(stats.closes(), 2);
    assert_eq!(tracker.state(), StreamState::Terminated);
}

#[tokio::test]
async fn test_cancellation_closes_live_connection() {
    let mut frames = handshake();
    frames.push(ScriptedFrame::Hang);
    let (tracker, stats) = create_tracker(vec![ConnectScript::Session(frames)]);
    let cancel = CancellationToken::new();

    let mut states = tracker.data_source().subscribe_state();
    let handle = tracker.spawn(cancel.clone());
    timeout(
        Duration::from_secs(5),
        states.wait_for(|state| *state == StreamState::Streaming),
    )
    .await
    .unwrap()
    .unwrap();

    cancel.cancel();
    let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(matches!(result, Err(ExchangeError::Cancelled)));

    assert_eq!(stats.connects(), 1);
    assert_eq!(stats.closes(), 1);
}
