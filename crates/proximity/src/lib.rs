//! Proximity scanner and alert lifecycle
//!
//! The scanner periodically evaluates every unordered pair of active
//! objects, classifies the miss distance against a [`ProximityPolicy`] and
//! drives each pair's alert through its lifecycle via the alert store.
//! The [`AlertDesk`] is the operator-facing side: listing open alerts,
//! acknowledging and resolving them.
//!
//! # Scalability
//!
//! A cycle evaluates `n * (n - 1) / 2` pairs for `n` active objects. This is
//! fine for tens to low hundreds of objects. A spatial index could prune far
//! pairs for larger catalogues, as long as pairs with an open alert are
//! still evaluated so that resolution keeps working.

pub mod desk;
pub mod error;
pub mod lifecycle;
pub mod policy;
pub mod scanner;

pub use desk::{AlertDesk, AlertStats};
pub use error::{ProximityError, Result};
pub use lifecycle::{plan_pair, LifecycleState, PairAction};
pub use policy::{Classification, ProximityPolicy};
pub use scanner::{
    plan_cycle, CycleOutcome, CyclePlan, OpenPairs, ProximityScanner, ScanReport, ScannerConfig,
    ScannerHandle,
};
