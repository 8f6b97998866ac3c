//! Tracked object models
//!
//! A tracked object is owned by the position store; the core only ever
//! holds it by value as a snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DomainError, Result};

/// Opaque, ordered object identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Create an identifier from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle status of a tracked object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStatus {
    /// In orbit and tracked
    #[default]
    Active,
    /// Re-entered or decayed
    Decayed,
    /// Status not known
    Unknown,
}

impl ObjectStatus {
    /// Wire and storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectStatus::Active => "active",
            ObjectStatus::Decayed => "decayed",
            ObjectStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(ObjectStatus::Active),
            "decayed" => Ok(ObjectStatus::Decayed),
            "unknown" => Ok(ObjectStatus::Unknown),
            other => Err(DomainError::UnknownValue(format!("object status '{}'", other))),
        }
    }
}

/// Position snapshot of a tracked object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Latitude in degrees, [-90, 90]
    pub lat: f64,

    /// Longitude in degrees, [-180, 180]
    pub lon: f64,

    /// Altitude above the surface in kilometres
    pub alt_km: f64,

    /// When this position was last reported
    pub last_update: DateTime<Utc>,
}

impl Position {
    /// Altitude assumed for records that carry no altitude
    pub const DEFAULT_ALT_KM: f64 = 400.0;

    /// Create a new position snapshot
    pub fn new(lat: f64, lon: f64, alt_km: f64, last_update: DateTime<Utc>) -> Self {
        Self {
            lat,
            lon,
            alt_km,
            last_update,
        }
    }

    /// Check that every field is finite and within its range
    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(DomainError::InvalidPosition(format!(
                "latitude {} outside [-90, 90]",
                self.lat
            )));
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(DomainError::InvalidPosition(format!(
                "longitude {} outside [-180, 180]",
                self.lon
            )));
        }
        if !self.alt_km.is_finite() || self.alt_km < 0.0 {
            return Err(DomainError::InvalidPosition(format!(
                "altitude {} km is negative or not finite",
                self.alt_km
            )));
        }
        Ok(())
    }

    /// Whether this position may be fed to the distance evaluator
    pub fn is_well_formed(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Tracked object as held by the position store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedObject {
    /// Unique identifier
    pub id: ObjectId,

    /// Display name
    pub name: String,

    /// Object status
    #[serde(default)]
    pub status: ObjectStatus,

    /// Last known position, if any
    #[serde(default)]
    pub position: Option<Position>,

    /// NORAD catalogue number (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norad_id: Option<u32>,

    /// Operating organisation (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,

    /// Country of registry (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl TrackedObject {
    /// Create an active object with no known position
    pub fn new(id: impl Into<ObjectId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: ObjectStatus::Active,
            position: None,
            norad_id: None,
            operator: None,
            country: None,
        }
    }

    /// Builder: set the position
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Builder: set the status
    pub fn with_status(mut self, status: ObjectStatus) -> Self {
        self.status = status;
        self
    }

    /// Only active objects take part in scanning and broadcast
    pub fn is_active(&self) -> bool {
        self.status == ObjectStatus::Active
    }

    /// Position usable for scanning, or `None` if the object must be skipped
    pub fn scan_position(&self) -> Option<&Position> {
        if !self.is_active() {
            return None;
        }
        self.position.as_ref().filter(|p| p.is_well_formed())
    }
}
