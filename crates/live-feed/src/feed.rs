//! Per-subscriber position feed
//!
//! Every [`Subscription`] owns one task that ticks at the configured
//! cadence, reads the active objects, projects them and offers the snapshot
//! to that subscriber's bounded channel. There is no shared timer table;
//! the handle is the only thing keeping the task alive.

use chrono::Utc;
use orbitwatch_store::PositionStore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::FeedError;
use crate::jitter::Jitter;
use crate::schema::{ObjectProjection, PositionSnapshot};

/// Live feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Milliseconds between snapshots
    pub tick_ms: u64,

    /// Presentation jitter amplitude in degrees, 0 to disable
    pub jitter_deg: f64,

    /// Snapshots buffered per subscriber before ticks are dropped
    pub channel_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            jitter_deg: 0.025,
            channel_capacity: 4,
        }
    }
}

impl FeedConfig {
    /// Snapshot cadence
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.tick_ms == 0 {
            return Err(FeedError::InvalidConfig(
                "tick_ms must be greater than zero".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(FeedError::InvalidConfig(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }
        if !self.jitter_deg.is_finite() || self.jitter_deg < 0.0 || self.jitter_deg > 1.0 {
            return Err(FeedError::InvalidConfig(format!(
                "jitter_deg {} outside [0, 1]",
                self.jitter_deg
            )));
        }
        Ok(())
    }
}

/// Source of per-subscriber position snapshots
pub struct LiveFeed {
    positions: Arc<dyn PositionStore>,
    config: FeedConfig,
    jitter: Jitter,
    next_id: AtomicU64,
    active: Arc<AtomicUsize>,
}

impl LiveFeed {
    /// Create a feed over a position store
    pub fn new(positions: Arc<dyn PositionStore>, config: FeedConfig) -> Result<Self, FeedError> {
        config.validate()?;
        Ok(Self {
            positions,
            jitter: Jitter::new(config.jitter_deg),
            config,
            next_id: AtomicU64::new(1),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Feed settings
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a subscription; the first snapshot is produced immediately
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let positions = Arc::clone(&self.positions);
        let jitter = self.jitter;
        let period = self.config.tick();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut tick: u64 = 0;
            let mut dropped: u64 = 0;

            loop {
                ticker.tick().await;
                match read_snapshot(positions.as_ref(), &jitter, tick).await {
                    Ok(snapshot) => match tx.try_send(snapshot) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            dropped += 1;
                            debug!(subscriber = id, tick, dropped, "Subscriber lagging, tick dropped");
                        }
                        Err(TrySendError::Closed(_)) => break,
                    },
                    Err(e) => {
                        warn!(subscriber = id, tick, error = %e, "Position snapshot failed, tick skipped");
                    }
                }
                tick += 1;
            }

            debug!(subscriber = id, "Subscription task finished");
        });

        self.active.fetch_add(1, Ordering::SeqCst);
        debug!(subscriber = id, "Subscription started");

        Subscription {
            id,
            rx,
            task,
            active: Arc::clone(&self.active),
        }
    }
}

async fn read_snapshot(
    positions: &dyn PositionStore,
    jitter: &Jitter,
    tick: u64,
) -> Result<PositionSnapshot, FeedError> {
    let objects = positions.list_active().await?;
    let total = objects.len();
    let mut projections: Vec<ObjectProjection> = objects
        .iter()
        .filter_map(ObjectProjection::from_object)
        .collect();
    if projections.len() < total {
        debug!(
            skipped = total - projections.len(),
            "Objects without a usable position left out of snapshot"
        );
    }
    for projection in &mut projections {
        jitter.apply(projection, tick);
    }

    Ok(PositionSnapshot {
        tick,
        generated_at: Utc::now(),
        positions: projections,
    })
}

/// Handle to one subscriber's feed
///
/// Dropping the handle aborts the ticking task.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<PositionSnapshot>,
    task: JoinHandle<()>,
    active: Arc<AtomicUsize>,
}

impl Subscription {
    /// Subscription identifier, unique within its feed
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next snapshot, or `None` once the task has stopped
    pub async fn recv(&mut self) -> Option<PositionSnapshot> {
        self.rx.recv().await
    }

    /// Snapshot if one is buffered
    pub fn try_recv(&mut self) -> Option<PositionSnapshot> {
        self.rx.try_recv().ok()
    }

    /// Stop the feed for this subscriber
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        self.active.fetch_sub(1, Ordering::SeqCst);
        debug!(subscriber = self.id, "Subscription closed");
    }
}
