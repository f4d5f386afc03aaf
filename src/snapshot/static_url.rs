//! URLs for third-party static map images, for hosts that would rather embed
//! a remote picture than run an off-screen capture.

use super::pins::RoutePoint;

const GOOGLE_STATIC_MAPS: &str = "https://maps.googleapis.com/maps/api/staticmap";
const OSM_STATIC_MAPS: &str = "https://staticmap.openstreetmap.fr/staticmap.php";
const ROUTE_COLOR: &str = "0xff9f5a";

#[derive(Debug, Clone, PartialEq)]
pub struct StaticMapOptions {
    pub width: u32,
    pub height: u32,
    pub zoom: u32,
    pub api_key: Option<String>,
}

impl Default for StaticMapOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            zoom: 12,
            api_key: None,
        }
    }
}

/// Google Static Maps when a key is configured, the keyless OSM renderer
/// otherwise. Empty for an empty route.
pub fn static_map_url(points: &[RoutePoint], options: &StaticMapOptions) -> String {
    let Some((center_lat, center_lng)) = centroid(points) else {
        return String::new();
    };

    match options.api_key.as_deref().filter(|key| !key.is_empty()) {
        Some(key) => google_url(points, options, (center_lat, center_lng), key),
        None => osm_url(points, options, (center_lat, center_lng)),
    }
}

/// Arithmetic mean of the points' coordinates.
pub fn centroid(points: &[RoutePoint]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
    let lng = points.iter().map(|p| p.lng).sum::<f64>() / n;
    Some((lat, lng))
}

fn google_url(
    points: &[RoutePoint],
    options: &StaticMapOptions,
    (center_lat, center_lng): (f64, f64),
    key: &str,
) -> String {
    let last = points.len() - 1;
    let markers = points
        .iter()
        .enumerate()
        .map(|(index, point)| {
            let color = match index {
                0 => "green",
                i if i == last => "red",
                _ => "blue",
            };
            format!("color:{color}|label:{}|{},{}", index + 1, point.lat, point.lng)
        })
        .collect::<Vec<_>>()
        .join("&markers=");

    let path = points
        .iter()
        .map(|p| format!("{},{}", p.lat, p.lng))
        .collect::<Vec<_>>()
        .join("|");

    format!(
        "{GOOGLE_STATIC_MAPS}?size={}x{}&zoom={}&center={center_lat},{center_lng}&markers={markers}&path=color:{ROUTE_COLOR}|weight:5|{path}&key={key}",
        options.width, options.height, options.zoom
    )
}

fn osm_url(
    points: &[RoutePoint],
    options: &StaticMapOptions,
    (center_lat, center_lng): (f64, f64),
) -> String {
    let markers = points
        .iter()
        .map(|p| format!("{},{},lightblue1", p.lat, p.lng))
        .collect::<Vec<_>>()
        .join("|");

    format!(
        "{OSM_STATIC_MAPS}?center={center_lat},{center_lng}&zoom={}&size={}x{}&markers={markers}&maptype=mapnik&format=png",
        options.zoom, options.width, options.height
    )
}
