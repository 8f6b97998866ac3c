//! Live feed over a real WebSocket connection
//!
//! # Scenarios
//!
//! 1. **Handshake**: a client gets an ack, then position snapshots
//! 2. **Alert digests**: a completed scan pushes `collision-alerts` to clients
//! 3. **Isolation**: a client that never reads does not starve another client
//! 4. **Cleanup**: disconnecting releases the client's subscription

use crate::test_utils::{init_tracing, sat_east, Backend};
use futures_util::StreamExt;
use orbitwatch_live_feed::{FeedConfig, LiveFeed, WsServer};
use orbitwatch_proximity::{AlertDesk, ProximityPolicy};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    backend: Backend,
    feed: Arc<LiveFeed>,
    server: Arc<WsServer>,
    addr: SocketAddr,
}

async fn start() -> Harness {
    init_tracing();
    let backend = Backend::memory();
    backend
        .seed(vec![sat_east("a", 0.0), sat_east("b", 0.5), sat_east("c", 900.0)])
        .await;

    let config = FeedConfig {
        tick_ms: 50,
        jitter_deg: 0.0,
        channel_capacity: 2,
    };
    let feed = Arc::new(LiveFeed::new(backend.positions.clone(), config).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(WsServer::new(addr, feed.clone()));
    tokio::spawn(server.clone().serve(listener));

    Harness {
        backend,
        feed,
        server,
        addr,
    }
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    client
}

/// Next JSON text message of the given type
async fn next_of_type(client: &mut Client, kind: &str) -> Value {
    timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(&text).unwrap();
                    if value["type"] == kind {
                        return value;
                    }
                }
                Some(Ok(_)) => {}
                other => panic!("connection ended while waiting for {}: {:?}", kind, other),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", kind))
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never became true");
}

#[tokio::test]
async fn test_client_receives_ack_then_positions() {
    let harness = start().await;
    let mut client = connect(harness.addr).await;

    let ack = next_of_type(&mut client, "ack").await;
    assert!(ack["message"].as_str().unwrap().contains("OrbitWatch"));

    let first = next_of_type(&mut client, "satellite-positions").await;
    let second = next_of_type(&mut client, "satellite-positions").await;
    assert!(second["tick"].as_u64().unwrap() > first["tick"].as_u64().unwrap());

    let positions = first["positions"].as_array().unwrap();
    assert_eq!(positions.len(), 3);
    assert_eq!(positions[0]["id"], "a");
    assert_eq!(positions[0]["altKm"], 400.0);
    assert_eq!(positions[0]["status"], "active");
}

#[tokio::test]
async fn test_scan_pushes_collision_alerts() {
    let harness = start().await;
    let scanner = Arc::new(harness.backend.scanner(ProximityPolicy::default()));
    let desk = AlertDesk::new(harness.backend.alerts.clone());
    let forwarder = harness
        .server
        .clone()
        .forward_scan_reports(scanner.subscribe_reports(), desk);

    let mut client = connect(harness.addr).await;
    next_of_type(&mut client, "ack").await;
    wait_until(|| harness.server.client_count() == 1).await;

    scanner.run_cycle().await.unwrap();
    let digest = next_of_type(&mut client, "collision-alerts").await;
    let alerts = digest["alerts"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["pairKey"], "a__b");
    assert_eq!(alerts[0]["level"], "critical");
    assert_eq!(alerts[0]["acknowledged"], false);

    forwarder.abort();
}

#[tokio::test]
async fn test_idle_client_does_not_starve_active_client() {
    let harness = start().await;
    let mut idle = connect(harness.addr).await;
    let mut active = connect(harness.addr).await;
    next_of_type(&mut idle, "ack").await;
    next_of_type(&mut active, "ack").await;

    let mut last_tick = None;
    for _ in 0..20 {
        let snapshot = next_of_type(&mut active, "satellite-positions").await;
        let tick = snapshot["tick"].as_u64().unwrap();
        if let Some(previous) = last_tick {
            assert!(tick > previous);
        }
        last_tick = Some(tick);
    }

    // the idle client is still connected and still gets fresh data
    let late = next_of_type(&mut idle, "satellite-positions").await;
    assert!(late["positions"].as_array().is_some());
}

#[tokio::test]
async fn test_disconnect_releases_subscription() {
    let harness = start().await;
    let mut client = connect(harness.addr).await;
    next_of_type(&mut client, "satellite-positions").await;
    assert_eq!(harness.feed.subscriber_count(), 1);

    client.close(None).await.unwrap();
    drop(client);

    wait_until(|| harness.feed.subscriber_count() == 0).await;
    wait_until(|| harness.server.client_count() == 0).await;
}
