//! Separation geometry
//!
//! The miss distance is a cheap approximation: the haversine surface
//! distance between the two sub-points, combined with the altitude delta as
//! the hypotenuse of a right triangle. It ignores orbital geometry and
//! relative velocity entirely and is only meant to flag objects that are
//! obviously close together.

use crate::object::Position;

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle surface distance between two lat/lon pairs in kilometres
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);

    // rounding can push `a` just outside [0, 1] for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Approximate 3-D miss distance between two positions in kilometres
///
/// Both positions must be well formed (see [`Position::is_well_formed`]);
/// for finite inputs the result is finite and never NaN.
pub fn miss_distance_km(a: &Position, b: &Position) -> f64 {
    let surface_km = haversine_km(a.lat, a.lon, b.lat, b.lon);
    let delta_alt_km = (b.alt_km - a.alt_km).abs();
    surface_km.hypot(delta_alt_km)
}
