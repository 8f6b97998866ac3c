//! Per-pair lifecycle decisions
//!
//! The scanner never mutates alerts itself. For every evaluated pair it
//! plans a [`PairAction`], and the alert store applies it atomically.
//! [`LifecycleState`] is the abstract view of a pair's record and is used to
//! reason about (and test) the transitions the store performs.

use chrono::{DateTime, Utc};
use orbitwatch_domain::{Alert, AlertLevel, Detection, DomainError, PairKey, TrackedObject};

use crate::policy::{Classification, ProximityPolicy};

/// What the scanner must do for one pair
#[derive(Debug, Clone, PartialEq)]
pub enum PairAction {
    /// Create or overwrite the pair's alert
    Upsert(Detection),
    /// Resolve the pair's alert if it is open
    Resolve(PairKey),
    /// Hysteresis band, leave the record alone
    Hold,
}

/// Plan the action for a pair at miss distance `miss_km`
pub fn plan_pair(
    a: &TrackedObject,
    b: &TrackedObject,
    miss_km: f64,
    policy: &ProximityPolicy,
    now: DateTime<Utc>,
) -> Result<PairAction, DomainError> {
    match policy.classify(miss_km) {
        Classification::InRange(level) => {
            Detection::new(a, b, miss_km, level, now).map(PairAction::Upsert)
        }
        Classification::Clear => PairAction::resolve(a, b),
        Classification::Hysteresis => Ok(PairAction::Hold),
    }
}

impl PairAction {
    fn resolve(a: &TrackedObject, b: &TrackedObject) -> Result<Self, DomainError> {
        PairKey::new(&a.id, &b.id).map(PairAction::Resolve)
    }
}

/// Abstract state of one pair's alert record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No record for the pair
    Absent,
    /// Open at a level
    Open { level: AlertLevel, acknowledged: bool },
    /// Resolved; the flag keeps whatever it was when resolved
    Resolved { acknowledged: bool },
}

impl LifecycleState {
    /// View of an optional stored record
    pub fn of(record: Option<&Alert>) -> Self {
        match record {
            None => LifecycleState::Absent,
            Some(alert) if alert.is_open() => LifecycleState::Open {
                level: alert.level,
                acknowledged: alert.acknowledged,
            },
            Some(alert) => LifecycleState::Resolved {
                acknowledged: alert.acknowledged,
            },
        }
    }

    /// State after the scanner sees `classification` for the pair
    pub fn after_scan(self, classification: Classification) -> Self {
        match (self, classification) {
            (LifecycleState::Open { acknowledged, .. }, Classification::InRange(level)) => {
                LifecycleState::Open {
                    level,
                    acknowledged,
                }
            }
            (_, Classification::InRange(level)) => LifecycleState::Open {
                level,
                acknowledged: false,
            },
            (LifecycleState::Open { acknowledged, .. }, Classification::Clear) => {
                LifecycleState::Resolved { acknowledged }
            }
            (state, _) => state,
        }
    }

    /// State after an operator acknowledgement, `None` if it is rejected
    pub fn after_acknowledge(self) -> Option<Self> {
        match self {
            LifecycleState::Open { level, .. } => Some(LifecycleState::Open {
                level,
                acknowledged: true,
            }),
            _ => None,
        }
    }

    /// State after an operator resolve, `None` if there is no record
    pub fn after_resolve(self) -> Option<Self> {
        match self {
            LifecycleState::Absent => None,
            LifecycleState::Open { acknowledged, .. } => {
                Some(LifecycleState::Resolved { acknowledged })
            }
            resolved => Some(resolved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitwatch_domain::Position;
    use proptest::prelude::*;

    fn sat(id: &str) -> TrackedObject {
        TrackedObject::new(id, id.to_uppercase())
            .with_position(Position::new(0.0, 0.0, 400.0, Utc::now()))
    }

    #[test]
    fn test_plan_in_range_builds_canonical_detection() {
        let action = plan_pair(
            &sat("zeta"),
            &sat("alpha"),
            1.234,
            &ProximityPolicy::default(),
            Utc::now(),
        )
        .unwrap();
        let PairAction::Upsert(detection) = action else {
            panic!("expected upsert, got {:?}", action);
        };
        assert_eq!(detection.pair_key.as_str(), "alpha__zeta");
        assert_eq!(detection.a_name, "ALPHA");
        assert_eq!(detection.miss_km, 1.23);
        assert_eq!(detection.level, AlertLevel::Warning);
    }

    #[test]
    fn test_plan_hysteresis_and_clear() {
        let policy = ProximityPolicy::default();
        let now = Utc::now();
        assert_eq!(
            plan_pair(&sat("a"), &sat("b"), 6.5, &policy, now).unwrap(),
            PairAction::Hold
        );
        assert_eq!(
            plan_pair(&sat("b"), &sat("a"), 9.0, &policy, now).unwrap(),
            PairAction::Resolve("a__b".parse().unwrap())
        );
    }

    #[test]
    fn test_plan_rejects_self_pair() {
        let err = plan_pair(&sat("a"), &sat("a"), 0.0, &ProximityPolicy::default(), Utc::now());
        assert!(matches!(err, Err(DomainError::InvalidPair(_))));
    }

    #[test]
    fn test_acknowledgement_kept_while_open_and_reset_on_reopen() {
        let state = LifecycleState::Absent
            .after_scan(Classification::InRange(AlertLevel::Watch))
            .after_acknowledge()
            .unwrap()
            .after_scan(Classification::InRange(AlertLevel::Critical));
        assert_eq!(
            state,
            LifecycleState::Open {
                level: AlertLevel::Critical,
                acknowledged: true
            }
        );

        let resolved = state.after_scan(Classification::Clear);
        assert_eq!(resolved, LifecycleState::Resolved { acknowledged: true });
        assert!(resolved.after_acknowledge().is_none());

        let reopened = resolved.after_scan(Classification::InRange(AlertLevel::Watch));
        assert_eq!(
            reopened,
            LifecycleState::Open {
                level: AlertLevel::Watch,
                acknowledged: false
            }
        );
    }

    #[test]
    fn test_clear_without_record_stays_absent() {
        assert_eq!(
            LifecycleState::Absent.after_scan(Classification::Clear),
            LifecycleState::Absent
        );
        assert!(LifecycleState::Absent.after_resolve().is_none());
    }

    fn classification() -> impl Strategy<Value = Classification> {
        prop_oneof![
            Just(Classification::Hysteresis),
            Just(Classification::Clear),
            prop::sample::select(AlertLevel::ALL.to_vec()).prop_map(Classification::InRange),
        ]
    }

    proptest! {
        #[test]
        fn prop_record_matches_abstract_state(steps in prop::collection::vec(classification(), 1..24)) {
            let now = Utc::now();
            let mut record: Option<Alert> = None;
            let mut model = LifecycleState::Absent;

            for (i, step) in steps.into_iter().enumerate() {
                match step {
                    Classification::InRange(level) => {
                        let detection =
                            Detection::new(&sat("a"), &sat("b"), level.band_km(), level, now).unwrap();
                        match record.as_mut() {
                            Some(alert) => {
                                alert.apply_detection(detection, now);
                            }
                            None => record = Some(Alert::open(detection, now)),
                        }
                    }
                    Classification::Clear => {
                        if let Some(alert) = record.as_mut() {
                            alert.mark_resolved(now);
                        }
                    }
                    Classification::Hysteresis => {}
                }
                model = model.after_scan(step);
                // acknowledge every third step while open
                if i % 3 == 0 {
                    if let Some(next) = model.after_acknowledge() {
                        if let Some(alert) = record.as_mut() {
                            prop_assert!(alert.acknowledge(now).is_ok());
                        }
                        model = next;
                    }
                }
                prop_assert_eq!(LifecycleState::of(record.as_ref()), model);
            }
        }
    }
}
