//! Proximity alerts
//!
//! An alert is keyed by the unordered pair of objects it concerns. The
//! record moves between two stored states, open and resolved, and carries an
//! orthogonal acknowledged flag:
//!
//! ```text
//!   (absent) --detect--> Open(level) --detect--> Open(level')
//!                            |                      ^
//!                         clear                  detect (ack reset)
//!                            v                      |
//!                         Resolved -----------------+
//! ```
//!
//! Acknowledgement is only accepted while open and is kept across level
//! changes; a reopen after resolution is a new incident and clears it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{DomainError, Result};
use crate::object::{ObjectId, TrackedObject};

/// Alert identifier, stable across in-place updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(Uuid);

impl AlertId {
    /// Generate a fresh identifier
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AlertId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("alert id '{}': {}", s, e)))
    }
}

/// Alert severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Within 10 km
    Info,
    /// Within 5 km
    Watch,
    /// Within 2 km
    Warning,
    /// Within 1 km
    Critical,
}

impl AlertLevel {
    /// All levels, least severe first
    pub const ALL: [AlertLevel; 4] = [
        AlertLevel::Info,
        AlertLevel::Watch,
        AlertLevel::Warning,
        AlertLevel::Critical,
    ];

    /// Inclusive upper edge of this level's miss-distance band
    pub fn band_km(&self) -> f64 {
        match self {
            AlertLevel::Critical => 1.0,
            AlertLevel::Warning => 2.0,
            AlertLevel::Watch => 5.0,
            AlertLevel::Info => 10.0,
        }
    }

    /// Most severe level whose band contains `miss_km`
    pub fn from_miss_km(miss_km: f64) -> Option<Self> {
        Self::ALL
            .iter()
            .rev()
            .copied()
            .find(|level| miss_km <= level.band_km())
    }

    /// Wire and storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Watch => "watch",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(AlertLevel::Info),
            "watch" => Ok(AlertLevel::Watch),
            "warning" => Ok(AlertLevel::Warning),
            "critical" => Ok(AlertLevel::Critical),
            other => Err(DomainError::UnknownValue(format!("alert level '{}'", other))),
        }
    }
}

/// Canonical, order-independent key of an unordered object pair
///
/// Each side is escaped (`%` as `%25`, `_` as `%5F`) before joining, so a
/// side never contains the separator and distinct pairs never share a key.
/// Ids without either character appear verbatim, e.g. `25544__48274`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PairKey(String);

impl PairKey {
    /// Separator between the two identities
    pub const SEPARATOR: &'static str = "__";

    /// Build the key for two distinct objects, in either order
    pub fn new(a: &ObjectId, b: &ObjectId) -> Result<Self> {
        if a == b {
            return Err(DomainError::InvalidPair(format!(
                "object {} cannot pair with itself",
                a
            )));
        }
        let (first, second) = Self::canonical(a, b);
        Ok(Self(format!(
            "{}{}{}",
            escape(first.as_str()),
            Self::SEPARATOR,
            escape(second.as_str())
        )))
    }

    /// Order two identities the way the key does: smaller first
    pub fn canonical<'a>(a: &'a ObjectId, b: &'a ObjectId) -> (&'a ObjectId, &'a ObjectId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Borrow the raw key
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PairKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        let (a, b) = s
            .split_once(Self::SEPARATOR)
            .ok_or_else(|| DomainError::InvalidPair(format!("'{}' has no separator", s)))?;
        if a.is_empty() || b.is_empty() {
            return Err(DomainError::InvalidPair(format!("'{}' has an empty side", s)));
        }
        let (a, b) = match (unescape(a), unescape(b)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(DomainError::InvalidPair(format!("'{}' is badly escaped", s))),
        };
        let key = Self::new(&ObjectId::new(a), &ObjectId::new(b))?;
        if key.0 != s {
            return Err(DomainError::InvalidPair(format!("'{}' is not canonical", s)));
        }
        Ok(key)
    }
}

impl TryFrom<String> for PairKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PairKey> for String {
    fn from(key: PairKey) -> Self {
        key.0
    }
}

fn escape(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '%' => out.push_str("%25"),
            '_' => out.push_str("%5F"),
            c => out.push(c),
        }
    }
    out
}

/// Inverse of `escape`; `None` for raw underscores or unknown escapes
fn unescape(side: &str) -> Option<String> {
    let mut out = String::with_capacity(side.len());
    let mut rest = side;
    while let Some(c) = rest.chars().next() {
        match c {
            '%' if rest.starts_with("%25") => {
                out.push('%');
                rest = &rest[3..];
            }
            '%' if rest.starts_with("%5F") => {
                out.push('_');
                rest = &rest[3..];
            }
            '%' | '_' => return None,
            c => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    Some(out)
}

/// Round a miss distance to the stored precision (two decimals)
pub fn round_km(miss_km: f64) -> f64 {
    (miss_km * 100.0).round() / 100.0
}

/// Snapshot of one in-range detection, as written by the scanner
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Pair this detection concerns
    pub pair_key: PairKey,
    /// Smaller object id
    pub a_sat_id: ObjectId,
    /// Larger object id
    pub b_sat_id: ObjectId,
    /// Display name of `a_sat_id` at detection time
    pub a_name: String,
    /// Display name of `b_sat_id` at detection time
    pub b_name: String,
    /// Miss distance in km, rounded to two decimals
    pub miss_km: f64,
    /// Level computed from the unrounded distance
    pub level: AlertLevel,
    /// Scan instant at which the distance was computed
    pub tca: DateTime<Utc>,
}

impl Detection {
    /// Build a detection for two objects given in any order
    pub fn new(
        a: &TrackedObject,
        b: &TrackedObject,
        miss_km: f64,
        level: AlertLevel,
        tca: DateTime<Utc>,
    ) -> Result<Self> {
        let pair_key = PairKey::new(&a.id, &b.id)?;
        let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };
        Ok(Self {
            pair_key,
            a_sat_id: first.id.clone(),
            b_sat_id: second.id.clone(),
            a_name: first.name.clone(),
            b_name: second.name.clone(),
            miss_km: round_km(miss_km),
            level,
            tca,
        })
    }
}

/// Stored state of an alert record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    /// Pair is, or was last seen, within the alert threshold
    Open,
    /// Pair separated beyond the resolve threshold, or resolved by hand
    Resolved,
}

/// Proximity alert record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Alert identifier
    pub id: AlertId,
    /// De-duplication key
    pub pair_key: PairKey,
    /// Smaller object id
    pub a_sat_id: ObjectId,
    /// Larger object id
    pub b_sat_id: ObjectId,
    /// Display name snapshot for `a_sat_id`
    pub a_name: String,
    /// Display name snapshot for `b_sat_id`
    pub b_name: String,
    /// Miss distance in km (two decimals)
    pub miss_km: f64,
    /// Time of closest approach (scan instant)
    pub tca: DateTime<Utc>,
    /// Current level
    pub level: AlertLevel,
    /// Set by an operator
    pub acknowledged: bool,
    /// Set by the scanner or by an operator
    pub resolved: bool,
    /// Record creation time
    pub created_at: DateTime<Utc>,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Open a new alert from a first detection
    pub fn open(detection: Detection, now: DateTime<Utc>) -> Self {
        Self {
            id: AlertId::new_v4(),
            pair_key: detection.pair_key,
            a_sat_id: detection.a_sat_id,
            b_sat_id: detection.b_sat_id,
            a_name: detection.a_name,
            b_name: detection.b_name,
            miss_km: detection.miss_km,
            tca: detection.tca,
            level: detection.level,
            acknowledged: false,
            resolved: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current stored state
    pub fn state(&self) -> AlertState {
        if self.resolved {
            AlertState::Resolved
        } else {
            AlertState::Open
        }
    }

    /// Whether the alert is open
    pub fn is_open(&self) -> bool {
        !self.resolved
    }

    /// Apply a subsequent detection in place
    ///
    /// Returns `true` if this reopened a resolved alert, in which case the
    /// acknowledgement was cleared.
    pub fn apply_detection(&mut self, detection: Detection, now: DateTime<Utc>) -> bool {
        debug_assert_eq!(self.pair_key, detection.pair_key);

        let reopened = self.resolved;
        self.a_sat_id = detection.a_sat_id;
        self.b_sat_id = detection.b_sat_id;
        self.a_name = detection.a_name;
        self.b_name = detection.b_name;
        self.miss_km = detection.miss_km;
        self.tca = detection.tca;
        self.level = detection.level;
        self.resolved = false;
        if reopened {
            self.acknowledged = false;
        }
        self.updated_at = now;
        reopened
    }

    /// Mark resolved; returns `false` if it already was
    pub fn mark_resolved(&mut self, now: DateTime<Utc>) -> bool {
        if self.resolved {
            return false;
        }
        self.resolved = true;
        self.updated_at = now;
        true
    }

    /// Record an operator acknowledgement
    pub fn acknowledge(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.resolved {
            return Err(DomainError::AlertNotOpen(self.id.to_string()));
        }
        if !self.acknowledged {
            self.acknowledged = true;
            self.updated_at = now;
        }
        Ok(())
    }
}
