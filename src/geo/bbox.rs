use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for all area estimates.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Keeps float rounding on the inside of the area limit after a shrink.
const SHRINK_SLACK: f64 = 1e-9;

/// Viewport notification pushed by the host map on every move/zoom end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
    pub zoom: f64,
}

impl Viewport {
    pub fn new(south: f64, west: f64, north: f64, east: f64, zoom: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
            zoom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Smallest box containing every `(lat, lng)` pair, or `None` for an empty
    /// iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points.into_iter().fold(None, |acc, (lat, lng)| {
            Some(match acc {
                None => Self::new(lat, lng, lat, lng),
                Some(b) => Self::new(
                    b.south.min(lat),
                    b.west.min(lng),
                    b.north.max(lat),
                    b.east.max(lng),
                ),
            })
        })
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }

    /// North-south extent in km along the center meridian.
    pub fn height_km(&self) -> f64 {
        let (_, center_lng) = self.center();
        haversine_km(self.south, center_lng, self.north, center_lng)
    }

    /// East-west extent in km along the center parallel.
    ///
    /// Small-angle haversine: the chord between the two edges shrinks with
    /// `cos(center_lat)`, so the estimate stays linear in the longitude span.
    pub fn width_km(&self) -> f64 {
        let (center_lat, _) = self.center();
        let dlng = (self.east - self.west).abs().to_radians();
        EARTH_RADIUS_KM * dlng * center_lat.to_radians().cos().abs()
    }

    pub fn area_km2(&self) -> f64 {
        self.width_km() * self.height_km()
    }

    pub fn is_valid(&self) -> bool {
        [self.south, self.west, self.north, self.east]
            .iter()
            .all(|v| v.is_finite())
            && self.south < self.north
            && self.west < self.east
    }
}

/// Great-circle distance between two coordinates, in km.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Reads the visible rectangle out of a viewport notification.
///
/// Edges are ordered and latitudes limited to the poles, so a host that
/// reports a flipped or overscrolled rectangle still yields a usable box.
pub fn resolve(viewport: &Viewport) -> BoundingBox {
    let south = viewport.south.min(viewport.north).clamp(-90.0, 90.0);
    let north = viewport.south.max(viewport.north).clamp(-90.0, 90.0);
    let west = viewport.west.min(viewport.east);
    let east = viewport.west.max(viewport.east);
    BoundingBox::new(south, west, north, east)
}

/// Shrinks `bbox` around its center until its area is at most `max_area_km2`.
///
/// Boxes already within the limit come back unchanged. A non-positive or
/// non-finite limit is treated as "no limit".
pub fn clamp(bbox: BoundingBox, max_area_km2: f64) -> BoundingBox {
    if !(max_area_km2.is_finite() && max_area_km2 > 0.0) {
        return bbox;
    }

    let area = bbox.area_km2();
    if !(area > max_area_km2) {
        return bbox;
    }

    let factor = (max_area_km2 / area).sqrt() * (1.0 - SHRINK_SLACK);

    let (center_lat, center_lng) = bbox.center();
    let half_lat = (bbox.north - bbox.south).abs() / 2.0 * factor;
    let half_lng = (bbox.east - bbox.west).abs() / 2.0 * factor;

    BoundingBox::new(
        center_lat - half_lat,
        center_lng - half_lng,
        center_lat + half_lat,
        center_lng + half_lng,
    )
}

/// De-duplication key: every edge rounded to two decimals (~1 km grid).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewportQueryKey(String);

impl ViewportQueryKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&BoundingBox> for ViewportQueryKey {
    fn from(bbox: &BoundingBox) -> Self {
        // `+ 0.0` folds -0.0 into 0.0 so "-0.00" never appears in a key.
        let r = |n: f64| (n * 100.0).round() / 100.0 + 0.0;
        Self(format!(
            "{:.2}|{:.2}|{:.2}|{:.2}",
            r(bbox.south),
            r(bbox.west),
            r(bbox.north),
            r(bbox.east)
        ))
    }
}

impl fmt::Display for ViewportQueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
