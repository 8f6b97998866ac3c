use orbitwatch_live_feed::LiveFeed;
use orbitwatch_proximity::{AlertDesk, ProximityScanner};
use orbitwatch_store::{AlertStore, MemoryStore, PositionStore, SqliteStore};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

pub struct AppState {
    pub positions: Arc<dyn PositionStore>,
    pub desk: AlertDesk,
    pub scanner: Arc<ProximityScanner>,
    pub feed: Arc<LiveFeed>,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let (positions, alerts): (Arc<dyn PositionStore>, Arc<dyn AlertStore>) =
            match &config.store.database_path {
                Some(path) => {
                    let store = Arc::new(SqliteStore::open(path)?);
                    info!(path = %path.display(), "Using SQLite store");
                    (store.clone(), store)
                }
                None => {
                    let store = Arc::new(MemoryStore::new());
                    info!("Using in-memory store");
                    (store.clone(), store)
                }
            };

        Self::with_stores(positions, alerts, config)
    }

    pub fn with_stores(
        positions: Arc<dyn PositionStore>,
        alerts: Arc<dyn AlertStore>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let scanner = Arc::new(ProximityScanner::new(
            positions.clone(),
            alerts.clone(),
            config.scanner.policy,
        )?);
        let feed = Arc::new(LiveFeed::new(positions.clone(), config.feed.clone())?);

        Ok(AppState {
            positions,
            desk: AlertDesk::new(alerts),
            scanner,
            feed,
        })
    }
}
