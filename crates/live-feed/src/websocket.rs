//! WebSocket Server for the Live Position Feed
//!
//! Each connected client gets:
//! - its own [`Subscription`](crate::feed::Subscription), forwarded as
//!   `satellite-positions` messages
//! - `collision-alerts` digests, published to every client after each scan

use futures_util::{SinkExt, StreamExt};
use orbitwatch_domain::Alert;
use orbitwatch_proximity::{AlertDesk, ScanReport};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::error::FeedError;
use crate::feed::LiveFeed;
use crate::schema::{AlertDigest, FeedMessage};

/// Alert digests kept for clients that fall behind
const DIGEST_CHANNEL_CAPACITY: usize = 64;

/// WebSocket server state
pub struct WsServer {
    /// Position feed, one subscription per client
    feed: Arc<LiveFeed>,

    /// Alert digests fanned out to all clients
    digest_tx: broadcast::Sender<FeedMessage>,

    /// Connected clients
    clients: AtomicUsize,

    /// Server address
    addr: SocketAddr,
}

impl WsServer {
    /// Create new WebSocket server
    pub fn new(addr: SocketAddr, feed: Arc<LiveFeed>) -> Self {
        let (digest_tx, _) = broadcast::channel(DIGEST_CHANNEL_CAPACITY);

        Self {
            feed,
            digest_tx,
            clients: AtomicUsize::new(0),
            addr,
        }
    }

    /// Configured listen address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of connected clients
    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    /// Bind the configured address and serve until the task is cancelled
    pub async fn run(self: Arc<Self>) -> Result<(), FeedError> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), FeedError> {
        info!("Live feed WebSocket listening on {}", listener.local_addr()?);

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("New WebSocket connection from {}", peer_addr);
                    let server = Arc::clone(&self);

                    tokio::spawn(async move {
                        server.clients.fetch_add(1, Ordering::SeqCst);
                        if let Err(e) = server.handle_connection(stream, peer_addr).await {
                            warn!("WebSocket connection error from {}: {}", peer_addr, e);
                        }
                        server.clients.fetch_sub(1, Ordering::SeqCst);
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    /// Handle individual WebSocket connection
    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), FeedError> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        // subscribed before the ack; dropping `subscription` stops the ticker
        let mut digest_rx = self.digest_tx.subscribe();
        let mut subscription = self.feed.subscribe();
        info!(peer = %peer_addr, subscriber = subscription.id(), "Live feed client connected");

        let ack = FeedMessage::Ack {
            message: "Connected to OrbitWatch live feed".to_string(),
        };
        ws_sender
            .send(Message::Text(serde_json::to_string(&ack)?))
            .await?;

        loop {
            tokio::select! {
                incoming = ws_receiver.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Text(text))) => {
                        debug!(peer = %peer_addr, "Ignoring client message: {}", text);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Error receiving from {}: {}", peer_addr, e);
                        break;
                    }
                },

                snapshot = subscription.recv() => match snapshot {
                    Some(snapshot) => {
                        let json = serde_json::to_string(&FeedMessage::SatellitePositions(snapshot))?;
                        if let Err(e) = ws_sender.send(Message::Text(json)).await {
                            warn!("Error sending to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                    None => break,
                },

                digest = digest_rx.recv() => match digest {
                    Ok(message) => {
                        let json = serde_json::to_string(&message)?;
                        if let Err(e) = ws_sender.send(Message::Text(json)).await {
                            warn!("Error sending to {}: {}", peer_addr, e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(peer = %peer_addr, skipped, "Client lagging on alert digests");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        info!(peer = %peer_addr, "Live feed client disconnected");
        Ok(())
    }

    /// Publish open alerts to all connected clients
    pub fn publish_alerts(&self, digest: AlertDigest) {
        // no connected clients is fine
        let _ = self.digest_tx.send(FeedMessage::CollisionAlerts(digest));
    }

    /// After every scan report, read the open alerts and publish them
    pub fn forward_scan_reports(
        self: Arc<Self>,
        mut reports: broadcast::Receiver<ScanReport>,
        desk: AlertDesk,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let report = match reports.recv().await {
                    Ok(report) => report,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Scan reports skipped by alert forwarder");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                match desk.open_alerts().await {
                    Ok(alerts) => self.publish_alerts(digest(report, alerts)),
                    Err(e) => warn!(error = %e, "Could not read open alerts for digest"),
                }
            }
        })
    }
}

fn digest(report: ScanReport, alerts: Vec<Alert>) -> AlertDigest {
    AlertDigest {
        scanned_at: report.started_at,
        alerts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedConfig;
    use chrono::Utc;
    use orbitwatch_store::MemoryStore;

    fn server() -> WsServer {
        let store = Arc::new(MemoryStore::new());
        let feed = Arc::new(LiveFeed::new(store, FeedConfig::default()).unwrap());
        WsServer::new("127.0.0.1:0".parse().unwrap(), feed)
    }

    #[tokio::test]
    async fn test_ws_server_creation() {
        let server = server();
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
        assert_eq!(server.client_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_reaches_digest_subscribers() {
        let server = server();
        let mut rx = server.digest_tx.subscribe();
        server.publish_alerts(AlertDigest {
            scanned_at: Utc::now(),
            alerts: Vec::new(),
        });
        assert!(matches!(
            rx.recv().await.unwrap(),
            FeedMessage::CollisionAlerts(_)
        ));
    }
}
