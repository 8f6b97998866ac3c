//! Domain module for OrbitWatch
//!
//! This crate contains pure domain logic with no I/O dependencies:
//! - Tracked objects and their position snapshots
//! - Proximity alerts, alert levels and canonical pair keys
//! - Separation geometry (the distance evaluator)

pub mod alert;
pub mod error;
pub mod geo;
pub mod object;

pub use alert::{round_km, Alert, AlertId, AlertLevel, AlertState, Detection, PairKey};
pub use error::{DomainError, Result};
pub use geo::{haversine_km, miss_distance_km, EARTH_RADIUS_KM};
pub use object::{ObjectId, ObjectStatus, Position, TrackedObject};
