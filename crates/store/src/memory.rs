//! In-process store backend

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orbitwatch_domain::{Alert, AlertId, Detection, ObjectId, PairKey, Position, TrackedObject};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::{sort_newest_first, AlertStore, PositionStore, UpsertChange, Upserted};

#[derive(Debug, Default)]
struct AlertTable {
    by_pair: HashMap<PairKey, Alert>,
    pair_of: HashMap<AlertId, PairKey>,
}

impl AlertTable {
    fn by_id_mut(&mut self, id: &AlertId) -> Result<&mut Alert> {
        let key = self
            .pair_of
            .get(id)
            .ok_or_else(|| StoreError::AlertNotFound(id.to_string()))?;
        self.by_pair
            .get_mut(key)
            .ok_or_else(|| StoreError::Corrupt(format!("alert index points at missing pair {}", key)))
    }
}

/// Position and alert store backed by in-memory maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<ObjectId, TrackedObject>>,
    alerts: RwLock<AlertTable>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with objects
    pub fn with_objects(objects: impl IntoIterator<Item = TrackedObject>) -> Self {
        let objects = objects
            .into_iter()
            .map(|o| (o.id.clone(), o))
            .collect::<BTreeMap<_, _>>();
        Self {
            objects: RwLock::new(objects),
            alerts: RwLock::new(AlertTable::default()),
        }
    }

    /// Total number of alert records, resolved included
    pub async fn alert_count(&self) -> usize {
        self.alerts.read().await.by_pair.len()
    }
}

#[async_trait]
impl PositionStore for MemoryStore {
    async fn list_active(&self) -> Result<Vec<TrackedObject>> {
        let objects = self.objects.read().await;
        Ok(objects.values().filter(|o| o.is_active()).cloned().collect())
    }

    async fn get_object(&self, id: &ObjectId) -> Result<Option<TrackedObject>> {
        Ok(self.objects.read().await.get(id).cloned())
    }

    async fn update_position(&self, id: &ObjectId, position: Position) -> Result<TrackedObject> {
        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(id)
            .ok_or_else(|| StoreError::ObjectNotFound(id.to_string()))?;
        object.position = Some(position);
        Ok(object.clone())
    }

    async fn upsert_object(&self, object: TrackedObject) -> Result<()> {
        self.objects.write().await.insert(object.id.clone(), object);
        Ok(())
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn find_by_pair_key(&self, key: &PairKey) -> Result<Option<Alert>> {
        Ok(self.alerts.read().await.by_pair.get(key).cloned())
    }

    async fn get_alert(&self, id: &AlertId) -> Result<Option<Alert>> {
        let table = self.alerts.read().await;
        Ok(table
            .pair_of
            .get(id)
            .and_then(|key| table.by_pair.get(key))
            .cloned())
    }

    async fn upsert(&self, detection: Detection, now: DateTime<Utc>) -> Result<Upserted> {
        let mut table = self.alerts.write().await;
        let key = detection.pair_key.clone();

        if let Some(existing) = table.by_pair.get_mut(&key) {
            let reopened = existing.apply_detection(detection, now);
            let change = if reopened {
                UpsertChange::Reopened
            } else {
                UpsertChange::Updated
            };
            return Ok(Upserted {
                alert: existing.clone(),
                change,
            });
        }

        let alert = Alert::open(detection, now);
        debug!(pair_key = %key, alert_id = %alert.id, "Alert record created");
        table.pair_of.insert(alert.id, key.clone());
        table.by_pair.insert(key, alert.clone());
        Ok(Upserted {
            alert,
            change: UpsertChange::Created,
        })
    }

    async fn mark_resolved(&self, key: &PairKey, now: DateTime<Utc>) -> Result<Option<Alert>> {
        let mut table = self.alerts.write().await;
        let Some(alert) = table.by_pair.get_mut(key) else {
            return Ok(None);
        };
        if alert.mark_resolved(now) {
            Ok(Some(alert.clone()))
        } else {
            Ok(None)
        }
    }

    async fn acknowledge(&self, id: &AlertId, now: DateTime<Utc>) -> Result<Alert> {
        let mut table = self.alerts.write().await;
        let alert = table.by_id_mut(id)?;
        alert.acknowledge(now)?;
        Ok(alert.clone())
    }

    async fn resolve(&self, id: &AlertId, now: DateTime<Utc>) -> Result<Alert> {
        let mut table = self.alerts.write().await;
        let alert = table.by_id_mut(id)?;
        alert.mark_resolved(now);
        Ok(alert.clone())
    }

    async fn list_open(&self) -> Result<Vec<Alert>> {
        let table = self.alerts.read().await;
        let mut open: Vec<Alert> = table.by_pair.values().filter(|a| a.is_open()).cloned().collect();
        sort_newest_first(&mut open);
        Ok(open)
    }
}
