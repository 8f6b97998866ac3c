//! Operator-facing alert operations

use chrono::Utc;
use orbitwatch_domain::{Alert, AlertId, AlertLevel};
use orbitwatch_store::AlertStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::error::{ProximityError, Result};

/// Open-alert counts by level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertStats {
    pub info: usize,
    pub watch: usize,
    pub warning: usize,
    pub critical: usize,
    pub total: usize,
}

impl AlertStats {
    /// Tally a set of alerts
    pub fn tally<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> Self {
        let mut stats = Self::default();
        for alert in alerts {
            match alert.level {
                AlertLevel::Info => stats.info += 1,
                AlertLevel::Watch => stats.watch += 1,
                AlertLevel::Warning => stats.warning += 1,
                AlertLevel::Critical => stats.critical += 1,
            }
            stats.total += 1;
        }
        stats
    }

    /// Count for one level
    pub fn count(&self, level: AlertLevel) -> usize {
        match level {
            AlertLevel::Info => self.info,
            AlertLevel::Watch => self.watch,
            AlertLevel::Warning => self.warning,
            AlertLevel::Critical => self.critical,
        }
    }
}

/// Listing, acknowledging and resolving alerts
#[derive(Clone)]
pub struct AlertDesk {
    alerts: Arc<dyn AlertStore>,
}

impl AlertDesk {
    pub fn new(alerts: Arc<dyn AlertStore>) -> Self {
        Self { alerts }
    }

    /// Non-resolved alerts, most recently updated first
    pub async fn open_alerts(&self) -> Result<Vec<Alert>> {
        self.alerts
            .list_open()
            .await
            .map_err(ProximityError::from_alert_store)
    }

    /// One alert by id, resolved or not
    pub async fn get(&self, id: &AlertId) -> Result<Alert> {
        self.alerts
            .get_alert(id)
            .await
            .map_err(ProximityError::from_alert_store)?
            .ok_or_else(|| ProximityError::AlertNotFound(id.to_string()))
    }

    /// Acknowledge an open alert
    ///
    /// Acknowledging twice is a no-op. A resolved alert is rejected with
    /// [`ProximityError::AlertNotOpen`].
    pub async fn acknowledge(&self, id: &AlertId) -> Result<Alert> {
        let alert = self
            .alerts
            .acknowledge(id, Utc::now())
            .await
            .map_err(ProximityError::from_alert_store)?;
        info!(alert_id = %id, pair_key = %alert.pair_key, "Alert acknowledged");
        Ok(alert)
    }

    /// Resolve an alert by hand; resolving a resolved alert is a no-op
    pub async fn resolve(&self, id: &AlertId) -> Result<Alert> {
        let alert = self
            .alerts
            .resolve(id, Utc::now())
            .await
            .map_err(ProximityError::from_alert_store)?;
        info!(alert_id = %id, pair_key = %alert.pair_key, "Alert resolved by operator");
        Ok(alert)
    }

    /// Counts of open alerts by level
    pub async fn stats(&self) -> Result<AlertStats> {
        Ok(AlertStats::tally(&self.open_alerts().await?))
    }
}
