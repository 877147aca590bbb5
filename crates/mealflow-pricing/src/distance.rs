//! Great-circle distance between coordinate pairs.

use mealflow_types::GeoPoint;

/// Mean earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometers.
pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
	let lat1 = from.latitude.to_radians();
	let lat2 = to.latitude.to_radians();
	let dlat = (to.latitude - from.latitude).to_radians();
	let dlon = (to.longitude - from.longitude).to_radians();

	let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
	let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
	EARTH_RADIUS_KM * c
}
