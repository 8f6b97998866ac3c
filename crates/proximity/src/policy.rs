//! Alert and resolve thresholds
//!
//! The level bands are fixed (see [`AlertLevel::band_km`]). The alert
//! threshold is therefore not a free number: it is the band edge of the
//! widest level allowed to open alerts. With the default `watch` policy the
//! info band can never be reached.

use orbitwatch_domain::AlertLevel;
use serde::{Deserialize, Serialize};

use crate::error::{ProximityError, Result};

/// Outcome of classifying one miss distance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Within the alert threshold, at this level
    InRange(AlertLevel),
    /// Between the alert and resolve thresholds
    Hysteresis,
    /// Beyond the resolve threshold
    Clear,
}

/// Thresholds driving the alert lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityPolicy {
    /// Widest level that opens or updates alerts
    pub open_level: AlertLevel,

    /// Distance in km beyond which an open alert resolves
    pub resolve_km: f64,
}

impl Default for ProximityPolicy {
    fn default() -> Self {
        Self {
            open_level: AlertLevel::Watch,
            resolve_km: 8.0,
        }
    }
}

impl ProximityPolicy {
    /// Policy that also opens info-level alerts
    pub fn wide() -> Self {
        Self {
            open_level: AlertLevel::Info,
            resolve_km: 12.0,
        }
    }

    /// Alert threshold in km
    pub fn alert_km(&self) -> f64 {
        self.open_level.band_km()
    }

    /// Reject policies without a hysteresis gap
    pub fn validate(&self) -> Result<()> {
        if !self.resolve_km.is_finite() {
            return Err(ProximityError::InvalidPolicy(format!(
                "resolve threshold {} is not finite",
                self.resolve_km
            )));
        }
        if self.resolve_km <= self.alert_km() {
            return Err(ProximityError::InvalidPolicy(format!(
                "resolve threshold {} km must be greater than alert threshold {} km ({} level)",
                self.resolve_km,
                self.alert_km(),
                self.open_level
            )));
        }
        Ok(())
    }

    /// Classify a miss distance
    pub fn classify(&self, miss_km: f64) -> Classification {
        if miss_km <= self.alert_km() {
            if let Some(level) = AlertLevel::from_miss_km(miss_km) {
                return Classification::InRange(level);
            }
        }
        if miss_km > self.resolve_km {
            Classification::Clear
        } else {
            Classification::Hysteresis
        }
    }
}
