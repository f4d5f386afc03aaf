pub mod bbox;
pub mod mercator;

pub use bbox::{clamp, haversine_km, resolve, BoundingBox, Viewport, ViewportQueryKey};

/// True when `lat`/`lng` are finite and inside the geographic ranges.
pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}
