//! Test utilities for cross-crate integration tests

use chrono::Utc;
use orbitwatch_domain::{ObjectId, Position, TrackedObject};
use orbitwatch_proximity::{CycleOutcome, ProximityPolicy, ProximityScanner, ScanReport};
use orbitwatch_store::{AlertStore, MemoryStore, PositionStore, SqliteStore};
use std::sync::{Arc, Once};

/// Kilometres per degree of longitude on the equator
pub const KM_PER_DEG: f64 = 111.195;

static TRACING: Once = Once::new();

/// Install a test subscriber once; output is captured by the test harness
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();
    });
}

/// Active object on the equator, `east_km` east of the prime meridian
pub fn sat_east(id: &str, east_km: f64) -> TrackedObject {
    TrackedObject::new(id, format!("SAT-{}", id.to_uppercase()))
        .with_position(equator(east_km, 400.0))
}

/// Position on the equator at a given altitude
pub fn equator(east_km: f64, alt_km: f64) -> Position {
    Position::new(0.0, east_km / KM_PER_DEG, alt_km, Utc::now())
}

/// Both store roles served by one backend
#[derive(Clone)]
pub struct Backend {
    pub name: &'static str,
    pub positions: Arc<dyn PositionStore>,
    pub alerts: Arc<dyn AlertStore>,
}

impl Backend {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            name: "memory",
            positions: store.clone(),
            alerts: store,
        }
    }

    pub fn sqlite() -> Self {
        let store = Arc::new(SqliteStore::open_in_memory().expect("in-memory sqlite"));
        Self {
            name: "sqlite",
            positions: store.clone(),
            alerts: store,
        }
    }

    /// Every backend, for running one scenario against each
    pub fn all() -> Vec<Self> {
        vec![Self::memory(), Self::sqlite()]
    }

    pub async fn seed(&self, objects: impl IntoIterator<Item = TrackedObject>) {
        for object in objects {
            self.positions.upsert_object(object).await.unwrap();
        }
    }

    pub async fn move_east(&self, id: &str, east_km: f64) {
        self.positions
            .update_position(&ObjectId::new(id), equator(east_km, 400.0))
            .await
            .unwrap();
    }

    pub fn scanner(&self, policy: ProximityPolicy) -> ProximityScanner {
        ProximityScanner::new(self.positions.clone(), self.alerts.clone(), policy).unwrap()
    }
}

/// Run one cycle and insist it completed
pub async fn scan(scanner: &ProximityScanner) -> ScanReport {
    match scanner.run_cycle().await {
        Ok(CycleOutcome::Completed(report)) => report,
        other => panic!("scan did not complete: {:?}", other),
    }
}
