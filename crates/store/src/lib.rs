//! Store interfaces consumed by the OrbitWatch core
//!
//! The proximity scanner and the live feed only talk to storage through
//! [`PositionStore`] and [`AlertStore`]. Two backends are provided:
//! - [`MemoryStore`]: in-process maps, used by tests and demo deployments
//! - [`SqliteStore`]: a single SQLite file with a unique pair-key column

pub mod error;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orbitwatch_domain::{Alert, AlertId, Detection, ObjectId, PairKey, Position, TrackedObject};
use serde::{Deserialize, Serialize};

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Read/update access to tracked objects
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// All objects with status `active`, ordered by id
    async fn list_active(&self) -> Result<Vec<TrackedObject>>;

    /// One object by id
    async fn get_object(&self, id: &ObjectId) -> Result<Option<TrackedObject>>;

    /// Replace the position of an existing object
    async fn update_position(&self, id: &ObjectId, position: Position) -> Result<TrackedObject>;

    /// Insert or replace a whole object record
    async fn upsert_object(&self, object: TrackedObject) -> Result<()>;
}

/// How an upsert changed the alert record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertChange {
    /// No record existed for the pair
    Created,
    /// Open record overwritten in place
    Updated,
    /// Resolved record reopened (acknowledgement cleared)
    Reopened,
}

/// Result of [`AlertStore::upsert`]
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted {
    /// Record as stored after the write
    pub alert: Alert,
    /// What the write did
    pub change: UpsertChange,
}

/// Alert persistence keyed by pair
///
/// Implementations must make every method atomic per record. `upsert` on an
/// existing pair key is an overwrite, never a duplicate-key error.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Record for a pair, resolved or not
    async fn find_by_pair_key(&self, key: &PairKey) -> Result<Option<Alert>>;

    /// Record by alert id
    async fn get_alert(&self, id: &AlertId) -> Result<Option<Alert>>;

    /// Create or update the pair's record from a detection
    async fn upsert(&self, detection: Detection, now: DateTime<Utc>) -> Result<Upserted>;

    /// Resolve the pair's open record; `None` if there was nothing open
    async fn mark_resolved(&self, key: &PairKey, now: DateTime<Utc>) -> Result<Option<Alert>>;

    /// Set the acknowledged flag on an open alert
    async fn acknowledge(&self, id: &AlertId, now: DateTime<Utc>) -> Result<Alert>;

    /// Resolve an alert by id (operator action)
    async fn resolve(&self, id: &AlertId, now: DateTime<Utc>) -> Result<Alert>;

    /// Non-resolved alerts, most recently updated first
    async fn list_open(&self) -> Result<Vec<Alert>>;
}

/// Sort alerts newest-updated first, pair key as tie-breaker
pub(crate) fn sort_newest_first(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.pair_key.cmp(&b.pair_key))
    });
}
