//! Spherical Web-Mercator helpers for 256 px raster tiles.

use std::f64::consts::PI;

use super::BoundingBox;

pub const TILE_SIZE: f64 = 256.0;
pub const MAX_ZOOM: f64 = 18.0;

/// Latitude beyond which Web-Mercator is undefined.
const MAX_LATITUDE: f64 = 85.051_128_78;

/// World pixel coordinates of `(lat, lng)` at `zoom`.
pub fn project(lat: f64, lng: f64, zoom: f64) -> (f64, f64) {
    let scale = TILE_SIZE * 2_f64.powf(zoom);
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let sin = lat.to_radians().sin();

    let x = (lng + 180.0) / 360.0 * scale;
    let y = (0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * PI)) * scale;
    (x, y)
}

/// Inverse of [`project`].
pub fn unproject(x: f64, y: f64, zoom: f64) -> (f64, f64) {
    let scale = TILE_SIZE * 2_f64.powf(zoom);
    let lng = x / scale * 360.0 - 180.0;
    let lat_rad = PI / 2.0 - 2.0 * ((y / scale - 0.5) * 2.0 * PI).exp().atan();
    (lat_rad.to_degrees(), lng)
}

/// Largest integer zoom at which `bounds` fits inside `width`×`height` after
/// `padding` pixels on every side. A degenerate box fits at [`MAX_ZOOM`].
pub fn fit_zoom(bounds: &BoundingBox, width: u32, height: u32, padding: u32) -> f64 {
    let (x0, y0) = project(bounds.north, bounds.west, 0.0);
    let (x1, y1) = project(bounds.south, bounds.east, 0.0);
    let span_x = (x1 - x0).abs();
    let span_y = (y1 - y0).abs();

    let avail_x = (width as f64 - 2.0 * padding as f64).max(1.0);
    let avail_y = (height as f64 - 2.0 * padding as f64).max(1.0);

    let scale_x = if span_x > 0.0 { avail_x / span_x } else { f64::INFINITY };
    let scale_y = if span_y > 0.0 { avail_y / span_y } else { f64::INFINITY };
    let scale = scale_x.min(scale_y);

    if !scale.is_finite() {
        return MAX_ZOOM;
    }
    scale.log2().floor().clamp(0.0, MAX_ZOOM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_projects_to_world_center() {
        let (x, y) = project(0.0, 0.0, 0.0);
        assert!((x - 128.0).abs() < 1e-9);
        assert!((y - 128.0).abs() < 1e-9);
    }

    #[test]
    fn unproject_inverts_project() {
        let (x, y) = project(52.23, 21.01, 12.0);
        let (lat, lng) = unproject(x, y, 12.0);
        assert!((lat - 52.23).abs() < 1e-9);
        assert!((lng - 21.01).abs() < 1e-9);
    }

    #[test]
    fn fit_zoom_shrinks_as_bounds_grow() {
        let city = BoundingBox::new(52.1, 20.9, 52.4, 21.2);
        let country = BoundingBox::new(49.0, 14.1, 54.8, 24.1);
        let near = fit_zoom(&city, 800, 480, 28);
        let far = fit_zoom(&country, 800, 480, 28);
        assert!(near > far);

        let (x0, y0) = project(country.north, country.west, far);
        let (x1, y1) = project(country.south, country.east, far);
        assert!((x1 - x0) <= 800.0 - 56.0);
        assert!((y1 - y0) <= 480.0 - 56.0);
    }

    #[test]
    fn single_point_fits_at_max_zoom() {
        let point = BoundingBox::new(52.2, 21.0, 52.2, 21.0);
        assert_eq!(fit_zoom(&point, 800, 480, 28), MAX_ZOOM);
    }
}
