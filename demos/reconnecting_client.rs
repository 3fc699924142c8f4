//! Watch a client ride out server restarts
//!
//! Point it at any WebSocket endpoint that speaks JSON:
//!
//! ```bash
//! cargo run --example reconnecting_client -- ws://127.0.0.1:9004
//! ```
//!
//! Stop and restart the server to see the backoff schedule, buffered
//! sends being flushed and the client giving up once its attempts run out.
//! `RUST_LOG=resock_client=debug` shows the controller's side of it.

use resock::client::ExponentialBackoff;
use resock::{ClientBuilder, ClientConfig, ConnectionEvent, Subscriber};
use serde::Serialize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct Tick {
    event: &'static str,
    seq: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:9004".to_string());

    let config = ClientConfig::default()
        .with_heartbeat_interval(Duration::from_secs(2))
        .with_heartbeat_timeout(Duration::from_secs(4));
    let strategy = ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(8))
        .with_max_attempts(8)
        .with_jitter(Duration::from_millis(250));

    let client = ClientBuilder::new(url.as_str())
        .with_config(config)
        .with_reconnect(Box::new(strategy))
        .build()?;

    let _everything = client.subscribe(Subscriber::new(|message| match message.as_json() {
        Some(value) => println!("<- {}", value),
        None => println!("<- (raw) {:?}", message.as_raw()),
    }));

    let mut events = client.events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ConnectionEvent::Opened { connection } => println!("** open ({})", connection),
                ConnectionEvent::Reconnecting { attempt, delay } => {
                    println!("** retry #{} in {:?}", attempt, delay)
                }
                ConnectionEvent::ReconnectExhausted { attempts } => {
                    println!("** gave up after {} attempts", attempts)
                }
                other => println!("** {:?}", other),
            }
        }
    });

    println!("Connecting to {}", url);
    client.connect().await?;

    // Ticks keep flowing while disconnected; they are buffered and flushed
    let mut seq = 0;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(3)) => {
                seq += 1;
                client.send_message(Tick { event: "tick", seq })?;
                println!("-> tick {} ({:?})", seq, client.state());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.close();
    Ok(())
}
