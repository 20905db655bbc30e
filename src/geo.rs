//! Angle and geodesic helpers shared by the HRIR lookup and the landmark
//! cues. Azimuths are circular: the canonical signed range is (-180, 180].

/// Earth radius in meters, spherical model.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Wraps an angle in degrees into the signed range (-180, 180].
pub fn normalize_signed_180(deg: f32) -> f32 {
    let wrapped = deg.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Wraps an angle in degrees into [0, 360).
pub fn normalize_0_360(deg: f32) -> f32 {
    deg.rem_euclid(360.0)
}

/// A WGS-ish latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Great-circle distance between two points in meters (haversine).
pub fn distance_m(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let d_phi = (to.latitude - from.latitude).to_radians();
    let d_lambda = (to.longitude - from.longitude).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing from `from` to `to` in degrees, [0, 360).
pub fn bearing_deg(from: &GeoPoint, to: &GeoPoint) -> f32 {
    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let d_lambda = (to.longitude - from.longitude).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();

    normalize_0_360(y.atan2(x).to_degrees() as f32)
}
