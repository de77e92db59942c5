//! Coordinate helpers: the offline distance approximation and the hash used
//! in directions cache keys.

use sha2::{Digest, Sha256};

/// Metres per degree of latitude, the scale for the flat-earth estimate.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Straight-line distance approximation in metres.
///
/// `sqrt(dlat^2 + dlng^2) * 111_320`, deliberately not haversine: the
/// offline fallback must be a cheap pure function of its inputs, and city
/// scale errors are irrelevant next to the mode-speed approximation layered
/// on top.
pub fn approx_distance_m(from_lat: f64, from_lng: f64, to_lat: f64, to_lng: f64) -> f64 {
    let dlat = from_lat - to_lat;
    let dlng = from_lng - to_lng;
    (dlat * dlat + dlng * dlng).sqrt() * METERS_PER_DEGREE
}

/// Deterministic 12-hex-char hash of a coordinate pair, truncated to six
/// decimals so nearby float noise maps to the same cache key.
pub fn coord_hash(lat: f64, lng: f64) -> String {
    let raw = format!("{lat:.6},{lng:.6}");
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(&digest[..6])
}
