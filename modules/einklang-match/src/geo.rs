use std::f64::consts::PI;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two lat/lon points in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let to_rad = |deg: f64| deg * PI / 180.0;

    let dlat = to_rad(lat2 - lat1);
    let dlon = to_rad(lon2 - lon1);

    let a = (dlat / 2.0).sin().powi(2)
        + to_rad(lat1).cos() * to_rad(lat2).cos() * (dlon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Round coordinates to 2 decimal places (~1km grid cell).
pub fn coarsen_coords(lat: f64, lon: f64) -> (f64, f64) {
    ((lat * 100.0).round() / 100.0, (lon * 100.0).round() / 100.0)
}
