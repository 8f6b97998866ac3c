//! Presentation jitter
//!
//! Positions can be offset by a small pseudo-random amount so that a static
//! catalogue still looks alive on a map. The offset is a BLAKE3 hash of the
//! object id and the tick number: the same object on the same tick always
//! moves the same way, across subscribers and restarts. Jitter is applied
//! to outgoing projections only and never written back to the store.

use orbitwatch_domain::ObjectId;

use crate::schema::ObjectProjection;

/// Deterministic lat/lon offset generator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jitter {
    amplitude_deg: f64,
}

impl Jitter {
    /// Offsets uniformly spread in `[-amplitude_deg, amplitude_deg]`
    pub fn new(amplitude_deg: f64) -> Self {
        Self {
            amplitude_deg: amplitude_deg.abs(),
        }
    }

    /// No offset at all
    pub fn none() -> Self {
        Self::new(0.0)
    }

    /// `(dlat, dlon)` for an object on a tick
    pub fn offset(&self, id: &ObjectId, tick: u64) -> (f64, f64) {
        if self.amplitude_deg == 0.0 {
            return (0.0, 0.0);
        }
        let mut hasher = blake3::Hasher::new();
        hasher.update(id.as_str().as_bytes());
        hasher.update(&tick.to_le_bytes());
        let hash = hasher.finalize();
        let bytes = hash.as_bytes();

        (
            self.amplitude_deg * unit_interval(&bytes[0..8]),
            self.amplitude_deg * unit_interval(&bytes[8..16]),
        )
    }

    /// Offset a projection in place, keeping it on the globe
    pub fn apply(&self, projection: &mut ObjectProjection, tick: u64) {
        let (dlat, dlon) = self.offset(&projection.id, tick);
        projection.lat = (projection.lat + dlat).clamp(-90.0, 90.0);
        projection.lon = wrap_lon(projection.lon + dlon);
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::new(0.025)
    }
}

/// Map eight hash bytes onto [-1, 1]
fn unit_interval(bytes: &[u8]) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    let raw = u64::from_le_bytes(buf);
    (raw as f64 / u64::MAX as f64) * 2.0 - 1.0
}

fn wrap_lon(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}
