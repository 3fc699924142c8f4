//! Heartbeat integration tests
//!
//! Ping scheduling, pong handling and dead-connection detection with a
//! paused clock. Defaults: ping after 5 s, 10 s to answer it.

mod common;

use common::{
    connect_and_open, drain_events, mock_client, quiet_config, reconnects_scheduled, settle,
    MockTransportFactory,
};
use resock_client::{ClientConfig, ConnectionEvent, ConnectionState, Subscriber};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MS: Duration = Duration::from_millis(1);

fn heartbeat_config() -> ClientConfig {
    quiet_config().with_heartbeat(true)
}

#[tokio::test(start_paused = true)]
async fn test_ping_sent_after_interval() {
    let factory = MockTransportFactory::new();
    let client = mock_client(&factory, heartbeat_config());
    let connection = connect_and_open(&client, &factory).await;

    tokio::time::sleep(Duration::from_secs(5) - MS).await;
    settle(&client).await;
    assert_eq!(connection.pings_sent(), 0);

    tokio::time::sleep(2 * MS).await;
    settle(&client).await;
    assert_eq!(connection.pings_sent(), 1);

    let ping: serde_json::Value =
        serde_json::from_str(connection.sent()[0].as_text().unwrap()).unwrap();
    assert_eq!(ping["event"], "ping");
    assert!(ping["timestamp"].is_u64());
}

#[tokio::test(start_paused = true)]
async fn test_pong_keeps_connection_alive() {
    let factory = MockTransportFactory::new();
    let client = mock_client(&factory, heartbeat_config());
    let connection = connect_and_open(&client, &factory).await;
    let mut events = client.events();

    // Ping at 5 s, answered at 6 s; next ping at 11 s
    tokio::time::sleep(Duration::from_secs(6)).await;
    connection.receive_json(json!({"event": "pong", "timestamp": 1}));
    settle(&client).await;

    // The first ping's deadline (15 s) passes without effect
    tokio::time::sleep(Duration::from_secs(10)).await;
    settle(&client).await;
    assert!(client.is_open());
    assert_eq!(connection.pings_sent(), 2);
    assert_eq!(reconnects_scheduled(&drain_events(&mut events)), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_pong_triggers_exactly_one_reconnect() {
    let factory = MockTransportFactory::new();
    let client = mock_client(&factory, heartbeat_config());
    let connection = connect_and_open(&client, &factory).await;
    let mut events = client.events();

    // Ping at 5 s, deadline at 15 s
    tokio::time::sleep(Duration::from_secs(15) - MS).await;
    settle(&client).await;
    assert!(client.is_open());

    tokio::time::sleep(2 * MS).await;
    settle(&client).await;

    assert_eq!(client.state(), ConnectionState::Reconnecting);
    assert!(connection.closed_by_client());
    let events = drain_events(&mut events);
    assert!(events.contains(&ConnectionEvent::HeartbeatTimeout));
    assert_eq!(reconnects_scheduled(&events), 1);

    // No more pings on the dead connection
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(connection.pings_sent(), 1);

    tokio::time::sleep(Duration::from_secs(1) + MS).await;
    settle(&client).await;
    assert_eq!(factory.connection_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_peer_ping_is_answered_and_not_dispatched() {
    let factory = MockTransportFactory::new();
    let client = mock_client(&factory, quiet_config());
    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    client.subscribe(Subscriber::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let connection = connect_and_open(&client, &factory).await;

    connection.receive_json(json!({"event": "ping", "timestamp": 42}));
    connection.receive_json(json!({"event": "pong", "timestamp": 43}));
    settle(&client).await;

    let sent = connection.sent_text();
    assert_eq!(sent.len(), 1);
    let pong: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(pong["event"], "pong");
    assert_eq!(delivered.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_disabled() {
    let factory = MockTransportFactory::new();
    let client = mock_client(&factory, quiet_config());
    let connection = connect_and_open(&client, &factory).await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    settle(&client).await;

    assert_eq!(connection.pings_sent(), 0);
    assert!(client.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_stops_when_connection_drops() {
    let factory = MockTransportFactory::new();
    let client = mock_client(&factory, heartbeat_config());
    let connection = connect_and_open(&client, &factory).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    connection.fail("reset");
    settle(&client).await;

    // The 5 s ping never goes out on the dropped connection
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connection.pings_sent(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_custom_heartbeat_timing() {
    let factory = MockTransportFactory::new();
    let config = heartbeat_config()
        .with_heartbeat_interval(Duration::from_secs(1))
        .with_heartbeat_timeout(Duration::from_secs(2));
    let client = mock_client(&factory, config);
    connect_and_open(&client, &factory).await;

    tokio::time::sleep(Duration::from_secs(3) + MS).await;
    settle(&client).await;
    assert_eq!(client.state(), ConnectionState::Reconnecting);
}
