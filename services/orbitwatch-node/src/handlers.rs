use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use orbitwatch_domain::{Alert, AlertId, ObjectId, ObjectStatus, Position};
use orbitwatch_proximity::{AlertStats, ProximityError};
use orbitwatch_store::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::state::AppState;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<ProximityError> for ApiError {
    fn from(err: ProximityError) -> Self {
        match err {
            ProximityError::AlertNotFound(_) => ApiError::NotFound(err.to_string()),
            ProximityError::AlertNotOpen(_) => ApiError::Conflict(err.to_string()),
            other => {
                error!(error = %other, "Alert operation failed");
                ApiError::Internal("Alert store unavailable".to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ObjectNotFound(_) | StoreError::AlertNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            StoreError::Domain(e) => ApiError::BadRequest(e.to_string()),
            other => {
                error!(error = %other, "Store operation failed");
                ApiError::Internal("Position store unavailable".to_string())
            }
        }
    }
}

fn parse_alert_id(raw: &str) -> Result<AlertId, ApiError> {
    raw.parse()
        .map_err(|e: orbitwatch_domain::DomainError| ApiError::BadRequest(e.to_string()))
}

#[derive(Debug, Serialize)]
pub struct AlertAction {
    ok: bool,
    alert: Alert,
}

/// Open alerts, newest first
pub async fn list_alerts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Alert>>, ApiError> {
    Ok(Json(state.desk.open_alerts().await?))
}

pub async fn alert_stats(State(state): State<Arc<AppState>>) -> Result<Json<AlertStats>, ApiError> {
    Ok(Json(state.desk.stats().await?))
}

pub async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AlertAction>, ApiError> {
    let id = parse_alert_id(&id)?;
    let alert = state.desk.acknowledge(&id).await?;
    Ok(Json(AlertAction { ok: true, alert }))
}

pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AlertAction>, ApiError> {
    let id = parse_alert_id(&id)?;
    let alert = state.desk.resolve(&id).await?;
    Ok(Json(AlertAction { ok: true, alert }))
}

/// Flat view used by the 3-D viewer
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSatellite {
    id: ObjectId,
    name: String,
    status: ObjectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<String>,
    lat: f64,
    lon: f64,
    alt_km: f64,
    updated_at: DateTime<Utc>,
}

pub async fn active_satellites(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ActiveSatellite>>, ApiError> {
    let objects = state.positions.list_active().await?;
    let satellites = objects
        .into_iter()
        .filter_map(|object| {
            let position = *object.scan_position()?;
            Some(ActiveSatellite {
                id: object.id,
                name: object.name,
                status: object.status,
                country: object.country,
                lat: position.lat,
                lon: position.lon,
                alt_km: position.alt_km,
                updated_at: position.last_update,
            })
        })
        .collect();
    Ok(Json(satellites))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    lat: f64,
    lon: f64,
    alt_km: Option<f64>,
}

pub async fn update_position(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<PositionUpdate>,
) -> Result<Json<Value>, ApiError> {
    let position = Position::new(
        update.lat,
        update.lon,
        update.alt_km.unwrap_or(Position::DEFAULT_ALT_KM),
        Utc::now(),
    );
    position
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let object = state
        .positions
        .update_position(&ObjectId::new(id), position)
        .await?;
    info!(id = %object.id, lat = position.lat, lon = position.lon, "Position updated");

    Ok(Json(json!({ "ok": true, "object": object })))
}
