//! Periodic proximity scanner
//!
//! One cycle lists the active objects, evaluates every unordered pair in a
//! deterministic order and applies the planned lifecycle action for each
//! pair through the alert store. Cycles never overlap: a tick (or an
//! on-demand call) that arrives while a cycle is running is skipped.

use chrono::{DateTime, Utc};
use orbitwatch_domain::{miss_distance_km, Alert, ObjectId, PairKey, TrackedObject};
use orbitwatch_store::{AlertStore, PositionStore, UpsertChange};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{ProximityError, Result};
use crate::lifecycle::{plan_pair, PairAction};
use crate::policy::{Classification, ProximityPolicy};

/// Scan reports kept for slow report subscribers
const REPORT_CHANNEL_CAPACITY: usize = 16;

/// Scanner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Seconds between cycle starts
    pub interval_secs: u64,

    /// Alert and resolve thresholds
    pub policy: ProximityPolicy,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            policy: ProximityPolicy::default(),
        }
    }
}

impl ScannerConfig {
    /// Cycle cadence
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate cadence and policy
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(ProximityError::InvalidPolicy(
                "scan interval must be at least one second".to_string(),
            ));
        }
        self.policy.validate()
    }
}

/// Summary of one completed cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// Scan instant, used as the TCA of every detection in the cycle
    pub started_at: DateTime<Utc>,
    /// Active objects listed
    pub objects: usize,
    /// Active objects skipped for lack of a well-formed position
    pub skipped_objects: usize,
    /// Unordered pairs evaluated
    pub pairs_evaluated: usize,
    /// Alerts created
    pub opened: usize,
    /// Open alerts updated in place
    pub updated: usize,
    /// Resolved alerts reopened
    pub reopened: usize,
    /// Open alerts resolved
    pub resolved: usize,
    /// Pairs whose store write failed
    pub failures: usize,
    /// Wall time of the cycle
    pub duration_ms: u64,
}

impl ScanReport {
    /// Whether the cycle changed any alert record state
    pub fn changed_alerts(&self) -> bool {
        self.opened + self.reopened + self.resolved > 0
    }
}

/// Result of asking for a cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Cycle ran to the end
    Completed(ScanReport),
    /// Another cycle was in progress
    Skipped,
}

/// Pure in-memory part of a cycle
#[derive(Debug, Clone, Default)]
pub struct CyclePlan {
    /// One entry per pair that needs a store call
    pub actions: Vec<PairAction>,
    /// Unordered pairs evaluated
    pub pairs_evaluated: usize,
    /// Objects without a usable position
    pub skipped_objects: usize,
}

/// Pairs that currently have an open alert, by canonical id order
#[derive(Debug, Clone, Default)]
pub struct OpenPairs(HashMap<ObjectId, HashSet<ObjectId>>);

impl OpenPairs {
    /// Record the pair of an open alert
    pub fn insert(&mut self, alert: &Alert) {
        let (first, second) = PairKey::canonical(&alert.a_sat_id, &alert.b_sat_id);
        self.0
            .entry(first.clone())
            .or_default()
            .insert(second.clone());
    }

    /// Whether `a` and `b`, in either order, have an open alert
    pub fn contains(&self, a: &ObjectId, b: &ObjectId) -> bool {
        let (first, second) = PairKey::canonical(a, b);
        self.0
            .get(first)
            .map_or(false, |partners| partners.contains(second))
    }

    /// Number of open pairs
    pub fn len(&self) -> usize {
        self.0.values().map(HashSet::len).sum()
    }

    /// No open pairs at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<&'a Alert> for OpenPairs {
    fn from_iter<I: IntoIterator<Item = &'a Alert>>(alerts: I) -> Self {
        let mut pairs = OpenPairs::default();
        for alert in alerts {
            pairs.insert(alert);
        }
        pairs
    }
}

/// Evaluate every unordered pair of `objects`
///
/// Objects are sorted by id first so the evaluation order, and with it the
/// order of store writes, is deterministic. Clear pairs only produce a
/// resolve action when `open` lists them.
pub fn plan_cycle(
    objects: &[TrackedObject],
    open: &OpenPairs,
    policy: &ProximityPolicy,
    now: DateTime<Utc>,
) -> CyclePlan {
    let mut candidates: Vec<_> = objects
        .iter()
        .filter_map(|object| object.scan_position().map(|position| (object, position)))
        .collect();
    candidates.sort_by(|a, b| a.0.id.cmp(&b.0.id));

    let mut plan = CyclePlan {
        skipped_objects: objects.len() - candidates.len(),
        ..CyclePlan::default()
    };

    for (i, (a, pos_a)) in candidates.iter().enumerate() {
        for (b, pos_b) in &candidates[i + 1..] {
            // a store may hand out duplicates; a pair needs two objects
            if a.id == b.id {
                continue;
            }
            plan.pairs_evaluated += 1;
            let miss_km = miss_distance_km(pos_a, pos_b);
            if policy.classify(miss_km) == Classification::Clear && !open.contains(&a.id, &b.id) {
                continue;
            }
            match plan_pair(a, b, miss_km, policy, now) {
                Ok(PairAction::Hold) => {}
                Ok(action) => plan.actions.push(action),
                Err(e) => debug!(a = %a.id, b = %b.id, error = %e, "Pair skipped"),
            }
        }
    }

    plan
}

/// Proximity scanner over a position store and an alert store
pub struct ProximityScanner {
    positions: Arc<dyn PositionStore>,
    alerts: Arc<dyn AlertStore>,
    policy: ProximityPolicy,
    cycle_guard: Mutex<()>,
    reports: broadcast::Sender<ScanReport>,
}

impl ProximityScanner {
    /// Create a scanner; the policy is validated here
    pub fn new(
        positions: Arc<dyn PositionStore>,
        alerts: Arc<dyn AlertStore>,
        policy: ProximityPolicy,
    ) -> Result<Self> {
        policy.validate()?;
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Ok(Self {
            positions,
            alerts,
            policy,
            cycle_guard: Mutex::new(()),
            reports,
        })
    }

    /// Active policy
    pub fn policy(&self) -> &ProximityPolicy {
        &self.policy
    }

    /// Receive a report after every completed cycle
    pub fn subscribe_reports(&self) -> broadcast::Receiver<ScanReport> {
        self.reports.subscribe()
    }

    /// Run one cycle now
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle with an explicit scan instant
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            debug!("Proximity scan already in progress, skipping");
            return Ok(CycleOutcome::Skipped);
        };

        let report = self.scan(now).await?;
        if report.changed_alerts() || report.failures > 0 {
            info!(
                objects = report.objects,
                pairs = report.pairs_evaluated,
                opened = report.opened,
                reopened = report.reopened,
                resolved = report.resolved,
                failures = report.failures,
                duration_ms = report.duration_ms,
                "Proximity scan complete"
            );
        } else {
            debug!(
                objects = report.objects,
                pairs = report.pairs_evaluated,
                updated = report.updated,
                duration_ms = report.duration_ms,
                "Proximity scan complete"
            );
        }
        // no receivers is fine
        let _ = self.reports.send(report.clone());
        Ok(CycleOutcome::Completed(report))
    }

    async fn scan(&self, now: DateTime<Utc>) -> Result<ScanReport> {
        let started = Instant::now();

        let objects = self
            .positions
            .list_active()
            .await
            .map_err(ProximityError::PositionStore)?;
        let open_alerts = self
            .alerts
            .list_open()
            .await
            .map_err(ProximityError::AlertStore)?;
        let open_pairs: OpenPairs = open_alerts.iter().collect();

        let plan = plan_cycle(&objects, &open_pairs, &self.policy, now);
        if plan.skipped_objects > 0 {
            debug!(
                skipped = plan.skipped_objects,
                "Objects without a usable position left out of scan"
            );
        }

        let mut report = ScanReport {
            started_at: now,
            objects: objects.len(),
            skipped_objects: plan.skipped_objects,
            pairs_evaluated: plan.pairs_evaluated,
            ..ScanReport::default()
        };

        for action in plan.actions {
            match action {
                PairAction::Upsert(detection) => {
                    let key = detection.pair_key.clone();
                    match self.alerts.upsert(detection, now).await {
                        Ok(upserted) => match upserted.change {
                            UpsertChange::Created => {
                                report.opened += 1;
                                info!(
                                    pair_key = %key,
                                    level = %upserted.alert.level,
                                    miss_km = upserted.alert.miss_km,
                                    "Proximity alert opened"
                                );
                            }
                            UpsertChange::Reopened => {
                                report.reopened += 1;
                                info!(
                                    pair_key = %key,
                                    level = %upserted.alert.level,
                                    miss_km = upserted.alert.miss_km,
                                    "Proximity alert reopened"
                                );
                            }
                            UpsertChange::Updated => report.updated += 1,
                        },
                        Err(e) => {
                            report.failures += 1;
                            warn!(pair_key = %key, error = %e, "Failed to write proximity alert");
                        }
                    }
                }
                PairAction::Resolve(key) => {
                    match self.alerts.mark_resolved(&key, now).await {
                        Ok(Some(alert)) => {
                            report.resolved += 1;
                            info!(pair_key = %key, alert_id = %alert.id, "Proximity alert resolved");
                        }
                        Ok(None) => {}
                        Err(e) => {
                            report.failures += 1;
                            warn!(pair_key = %key, error = %e, "Failed to resolve proximity alert");
                        }
                    }
                }
                PairAction::Hold => {}
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Start the periodic scan task; the first cycle runs immediately
    pub fn spawn(self: Arc<Self>, interval: Duration) -> ScannerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        info!(
            interval_secs = interval.as_secs(),
            alert_km = self.policy.alert_km(),
            resolve_km = self.policy.resolve_km,
            "Proximity scanner running"
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    outcome = self.run_cycle() => match outcome {
                        Ok(CycleOutcome::Completed(_)) => {}
                        Ok(CycleOutcome::Skipped) => debug!("Scheduled scan skipped"),
                        Err(e) => warn!(error = %e, "Proximity scan cycle abandoned"),
                    },
                }
            }

            info!("Proximity scanner stopped");
        });

        ScannerHandle { shutdown, task }
    }
}

/// Handle to a running scanner task
///
/// Dropping the handle also stops the scanner.
pub struct ScannerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ScannerHandle {
    /// Stop the scanner and wait for its task to exit
    ///
    /// An in-flight cycle is abandoned between store calls.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            if e.is_panic() {
                warn!(error = %e, "Proximity scanner task panicked");
            }
        }
    }

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
