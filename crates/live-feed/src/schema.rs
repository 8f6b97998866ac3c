//! Wire schema for live feed messages.
//!
//! Message type names and field keys are stable; dashboard clients match on
//! `satellite-positions` and `collision-alerts`.

use chrono::{DateTime, Utc};
use orbitwatch_domain::{Alert, ObjectId, ObjectStatus, TrackedObject};
use serde::{Deserialize, Serialize};

/// Envelope for everything sent to a live feed client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum FeedMessage {
    /// Positions of all active objects for one tick.
    #[serde(rename = "satellite-positions")]
    SatellitePositions(PositionSnapshot),

    /// Open alerts after a scan cycle.
    #[serde(rename = "collision-alerts")]
    CollisionAlerts(AlertDigest),

    /// Connection acknowledgment.
    #[serde(rename = "ack")]
    Ack {
        /// Human-readable status message
        message: String,
    },
}

/// Broadcast view of one object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectProjection {
    /// Object identifier.
    pub id: ObjectId,
    /// Display name.
    pub name: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Altitude in km.
    pub alt_km: f64,
    /// Object status.
    pub status: ObjectStatus,
}

impl ObjectProjection {
    /// Project an object, or `None` if it is inactive or has no usable position.
    pub fn from_object(object: &TrackedObject) -> Option<Self> {
        let position = object.scan_position()?;
        Some(Self {
            id: object.id.clone(),
            name: object.name.clone(),
            lat: position.lat,
            lon: position.lon,
            alt_km: position.alt_km,
            status: object.status,
        })
    }
}

/// Positions delivered to one subscriber on one tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PositionSnapshot {
    /// Tick number within the subscription, starting at zero.
    pub tick: u64,
    /// When the snapshot was read from the store.
    pub generated_at: DateTime<Utc>,
    /// Active objects, ordered by id.
    pub positions: Vec<ObjectProjection>,
}

/// Open alerts pushed after a scan cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertDigest {
    /// Scan instant the digest follows.
    pub scanned_at: DateTime<Utc>,
    /// Non-resolved alerts, most recently updated first.
    pub alerts: Vec<Alert>,
}
