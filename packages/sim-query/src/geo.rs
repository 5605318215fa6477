//! Great-circle distance and radius queries over records with a location.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sim_core::SimError;

use crate::filter::get_path;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Largest radius accepted for a location restriction.
pub const MAX_RADIUS_M: f64 = 50_000.0;

/// A point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    /// Validated constructor.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, SimError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(SimError::InvalidInput(format!(
                "latitude must be between -90 and 90, got {}",
                latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(SimError::InvalidInput(format!(
                "longitude must be between -180 and 180, got {}",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Reads `{"latitude": .., "longitude": ..}`.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            latitude: value.get("latitude")?.as_f64()?,
            longitude: value.get("longitude")?.as_f64()?,
        })
    }

    pub fn distance_to(&self, other: &LatLng) -> f64 {
        haversine_distance(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Distance in metres between two points given in degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// A circular location restriction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: LatLng,
    /// Radius in metres
    pub radius: f64,
}

impl Circle {
    pub fn new(center: LatLng, radius: f64) -> Result<Self, SimError> {
        if !(0.0..=MAX_RADIUS_M).contains(&radius) {
            return Err(SimError::InvalidInput(format!(
                "radius must be between 0 and {}, got {}",
                MAX_RADIUS_M, radius
            )));
        }
        Ok(Self { center, radius })
    }

    /// True when `point` lies on or inside the circle.
    pub fn contains(&self, point: &LatLng) -> bool {
        self.center.distance_to(point) <= self.radius
    }
}

/// A record found by [`nearby`].
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyRecord {
    pub record: Value,
    /// Whole metres from the origin
    pub distance_meters: u64,
}

/// Records whose `location_field` lies within `radius` metres of `origin`,
/// nearest first.
///
/// Records without a readable location are skipped.
pub fn nearby<'a, I>(records: I, origin: LatLng, radius: f64, location_field: &str) -> Vec<NearbyRecord>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut found: Vec<(f64, &Value)> = records
        .into_iter()
        .filter_map(|r| {
            let location = get_path(r, location_field).and_then(LatLng::from_value)?;
            let distance = origin.distance_to(&location);
            (distance <= radius).then_some((distance, r))
        })
        .collect();
    found.sort_by(|a, b| a.0.total_cmp(&b.0));
    found
        .into_iter()
        .map(|(distance, record)| NearbyRecord {
            record: record.clone(),
            distance_meters: distance as u64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PARIS: (f64, f64) = (48.8566, 2.3522);
    const LONDON: (f64, f64) = (51.5074, -0.1278);

    #[test]
    fn test_haversine_known_distance() {
        let d = haversine_distance(PARIS.0, PARIS.1, LONDON.0, LONDON.1);
        assert!((d - 343_556.0).abs() < 1_000.0, "got {}", d);
        assert_eq!(haversine_distance(10.0, 20.0, 10.0, 20.0), 0.0);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = haversine_distance(PARIS.0, PARIS.1, LONDON.0, LONDON.1);
        let b = haversine_distance(LONDON.0, LONDON.1, PARIS.0, PARIS.1);
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_circle_contains() {
        let center = LatLng::new(PARIS.0, PARIS.1).unwrap();
        let circle = Circle::new(center, 5_000.0).unwrap();
        assert!(circle.contains(&center));
        assert!(circle.contains(&LatLng::new(48.8606, 2.3376).unwrap()));
        assert!(!circle.contains(&LatLng::new(LONDON.0, LONDON.1).unwrap()));
    }

    #[test]
    fn test_validation() {
        assert!(LatLng::new(91.0, 0.0).is_err());
        assert!(LatLng::new(0.0, -181.0).is_err());
        let center = LatLng::new(0.0, 0.0).unwrap();
        assert!(Circle::new(center, -1.0).is_err());
        assert!(Circle::new(center, 50_001.0).is_err());
    }

    #[test]
    fn test_nearby_sorted_and_filtered() {
        let places = vec![
            json!({"id": "louvre", "location": {"latitude": 48.8606, "longitude": 2.3376}}),
            json!({"id": "eiffel", "location": {"latitude": 48.8584, "longitude": 2.2945}}),
            json!({"id": "big-ben", "location": {"latitude": 51.5007, "longitude": -0.1246}}),
            json!({"id": "nowhere"}),
        ];
        let origin = LatLng::new(PARIS.0, PARIS.1).unwrap();
        let found = nearby(&places, origin, 10_000.0, "location");

        let ids: Vec<&str> = found.iter().map(|n| n.record["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["louvre", "eiffel"]);
        assert!(found[0].distance_meters < found[1].distance_meters);
    }
}
