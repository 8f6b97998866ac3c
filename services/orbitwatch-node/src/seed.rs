//! Startup catalogue from a legacy satellite JSON file

use anyhow::Context;
use chrono::Utc;
use orbitwatch_domain::{ObjectStatus, Position, TrackedObject};
use orbitwatch_store::PositionStore;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Legacy identifiers were numeric; newer files use strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyId {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySatellite {
    id: Option<LegacyId>,
    name: Option<String>,
    status: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    alt_km: Option<f64>,
    operator: Option<String>,
    country: Option<String>,
    norad_id: Option<u32>,
}

fn legacy_status(raw: Option<&str>) -> ObjectStatus {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("active") | Some("operational") => ObjectStatus::Active,
        Some("decayed") | Some("retired") => ObjectStatus::Decayed,
        _ => ObjectStatus::Unknown,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl LegacySatellite {
    /// `None` when the record has nothing to identify it by
    fn into_object(self) -> Option<TrackedObject> {
        let name = non_empty(self.name);
        let id = match self.id {
            Some(LegacyId::Number(n)) => n.to_string(),
            Some(LegacyId::Text(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => match (self.norad_id, &name) {
                (Some(norad), _) => norad.to_string(),
                (None, Some(name)) => name.clone(),
                (None, None) => return None,
            },
        };

        let operator = non_empty(self.operator);
        let position = Position::new(
            self.lat.unwrap_or(0.0),
            self.lon.unwrap_or(0.0),
            self.alt_km.unwrap_or(Position::DEFAULT_ALT_KM),
            Utc::now(),
        );

        let mut object = TrackedObject::new(id, name.unwrap_or_else(|| "Unnamed Satellite".to_string()))
            .with_status(legacy_status(self.status.as_deref()))
            .with_position(position);
        object.country = non_empty(self.country).or_else(|| operator.clone());
        object.operator = operator;
        object.norad_id = self.norad_id;
        Some(object)
    }
}

/// Parse a seed file body into objects
pub fn parse(body: &str) -> anyhow::Result<Vec<TrackedObject>> {
    let records: Vec<LegacySatellite> =
        serde_json::from_str(body).context("seed file is not a JSON array of satellites")?;
    let total = records.len();
    let objects: Vec<TrackedObject> = records
        .into_iter()
        .filter_map(LegacySatellite::into_object)
        .collect();
    if objects.len() < total {
        warn!(
            skipped = total - objects.len(),
            "Seed records without id, noradId or name were skipped"
        );
    }
    Ok(objects)
}

/// Load a seed file into the position store
pub async fn load(path: &Path, store: &dyn PositionStore) -> anyhow::Result<usize> {
    let body = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let objects = parse(&body)?;
    let count = objects.len();
    for object in objects {
        if let Err(e) = object.position.as_ref().map(Position::validate).transpose() {
            warn!(id = %object.id, error = %e, "Seeded object has an unusable position");
        }
        store
            .upsert_object(object)
            .await
            .context("writing seeded object")?;
    }
    info!(count, path = %path.display(), "Seed catalogue loaded");
    Ok(count)
}
