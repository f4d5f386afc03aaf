use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, Rgba, RgbaImage};
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};
use uuid::Uuid;

use crate::geo::BoundingBox;
use crate::settings::SnapshotSettings;

use super::engine::{MapEngine, MapOptions, SurfaceGuard};
use super::pins::{normalize_label, RoutePin, RoutePoint};
use super::static_url::centroid;
use super::text;
use super::wait::{tiles_or_timeout, TileWait};

const ENABLE_LOGS: bool = true;
use crate::{log_debug, log_error, log_info, log_warn};

const DATA_URL_PREFIX: &str = "data:image/png;base64,";
const SURFACE_PREFIX: &str = "travel-map-snapshot-";

const PLACEHOLDER_BACKGROUND: Rgba<u8> = Rgba([240, 240, 240, 255]);
const PLACEHOLDER_INK: Rgba<u8> = Rgba([102, 102, 102, 255]);
pub const PLACEHOLDER_CAPTION: &str = "MAP NOT AVAILABLE";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotOptions {
    pub width: u32,
    pub height: u32,
    pub zoom: f64,
}

impl From<&SnapshotSettings> for SnapshotOptions {
    fn from(settings: &SnapshotSettings) -> Self {
        Self {
            width: settings.width,
            height: settings.height,
            zoom: settings.zoom,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    pub data_url: String,
}

impl EncodedImage {
    pub fn from_rgba(image: &RgbaImage) -> Result<Self> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("failed to encode PNG")?;

        Ok(Self {
            width: image.width(),
            height: image.height(),
            data_url: format!("{DATA_URL_PREFIX}{}", STANDARD.encode(png)),
        })
    }

    /// Raw PNG bytes behind the data URL.
    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        let payload = self
            .data_url
            .strip_prefix(DATA_URL_PREFIX)
            .context("not a PNG data URL")?;
        STANDARD.decode(payload).context("invalid base64 payload")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "image", rename_all = "camelCase")]
pub enum SnapshotResult {
    Captured(EncodedImage),
    /// The map could not be rendered; a neutral image of the requested size.
    Placeholder(EncodedImage),
    /// Nothing to draw.
    NoSnapshot,
}

impl SnapshotResult {
    pub fn image(&self) -> Option<&EncodedImage> {
        match self {
            SnapshotResult::Captured(image) | SnapshotResult::Placeholder(image) => Some(image),
            SnapshotResult::NoSnapshot => None,
        }
    }
}

type Slot = Arc<OnceCell<SnapshotResult>>;

/// Bounded, insertion-ordered memo of captures. A slot is handed out as soon
/// as a capture starts, so identical concurrent calls share one render.
struct SnapshotCache {
    capacity: usize,
    entries: VecDeque<(String, Slot)>,
}

impl SnapshotCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
        }
    }

    /// The slot for `key`, created (and possibly evicting the oldest) if absent.
    fn slot(&mut self, key: &str) -> Slot {
        if let Some((_, slot)) = self.entries.iter().find(|(k, _)| k == key) {
            return slot.clone();
        }

        let slot = Slot::default();
        if self.capacity > 0 {
            while self.entries.len() >= self.capacity {
                self.entries.pop_front();
            }
            self.entries.push_back((key.to_string(), slot.clone()));
        }
        slot
    }

    /// Forgets `slot` if it is still the entry for `key`.
    fn evict(&mut self, key: &str, slot: &Slot) {
        self.entries
            .retain(|(k, existing)| !(k == key && Arc::ptr_eq(existing, slot)));
    }
}

fn cache_key(points: &[RoutePoint], options: &SnapshotOptions) -> String {
    let route = points
        .iter()
        .map(|p| {
            let label = p.label.as_deref().and_then(normalize_label).unwrap_or_default();
            format!("{:.6},{:.6},{label}", p.lat, p.lng)
        })
        .collect::<Vec<_>>()
        .join(";");
    format!("{route}|{}x{}@{}", options.width, options.height, options.zoom)
}

/// Renders a route into a throwaway off-screen map and reads it back as a
/// PNG. Always hands back an image once there is something to draw.
pub struct SnapshotGenerator<E: MapEngine> {
    engine: Arc<E>,
    settings: SnapshotSettings,
    cache: Mutex<SnapshotCache>,
}

impl<E: MapEngine> SnapshotGenerator<E> {
    pub fn new(engine: Arc<E>, settings: SnapshotSettings) -> Self {
        let cache = SnapshotCache::new(settings.cache_capacity);
        Self {
            engine,
            settings,
            cache: Mutex::new(cache),
        }
    }

    pub async fn capture(&self, points: &[RoutePoint], options: SnapshotOptions) -> SnapshotResult {
        let points: Vec<RoutePoint> = points.iter().filter(|p| p.is_valid()).cloned().collect();
        if points.is_empty() {
            log_debug!("no valid route points, skipping snapshot");
            return SnapshotResult::NoSnapshot;
        }
        if options.width == 0 || options.height == 0 {
            log_warn!("refusing empty {}x{} snapshot", options.width, options.height);
            return SnapshotResult::NoSnapshot;
        }

        let key = cache_key(&points, &options);
        let slot = self.cache.lock().await.slot(&key);
        if slot.initialized() {
            log_debug!("snapshot cache hit for {} points", points.len());
        }

        let result = slot
            .get_or_init(|| self.capture_uncached(&points, &options))
            .await
            .clone();

        // Only real captures are worth keeping; a later call retries the rest.
        if !matches!(result, SnapshotResult::Captured(_)) {
            self.cache.lock().await.evict(&key, &slot);
        }
        result
    }

    async fn capture_uncached(
        &self,
        points: &[RoutePoint],
        options: &SnapshotOptions,
    ) -> SnapshotResult {
        let captured = self
            .render(points, options)
            .await
            .and_then(|image| EncodedImage::from_rgba(&image));

        match captured {
            Ok(encoded) => {
                log_info!(
                    "captured {}x{} route snapshot with {} points",
                    encoded.width,
                    encoded.height,
                    points.len()
                );
                SnapshotResult::Captured(encoded)
            }
            Err(err) => {
                log_warn!("route snapshot failed, using placeholder: {err:#}");
                placeholder(options.width, options.height)
            }
        }
    }

    async fn render(&self, points: &[RoutePoint], options: &SnapshotOptions) -> Result<RgbaImage> {
        let engine = self.engine.as_ref();
        let surface_id = format!("{SURFACE_PREFIX}{}", Uuid::new_v4());
        let mut guard = SurfaceGuard::create(engine, surface_id, options.width, options.height)
            .context("failed to create off-screen surface")?;

        let (lat, lng) = centroid(points).context("route has no points")?;
        let map = engine
            .create_map(
                guard.surface(),
                MapOptions {
                    center: (lat, lng),
                    zoom: options.zoom,
                    animate: false,
                },
            )
            .context("failed to create snapshot map")?;
        guard.attach_map(map);

        for pin in RoutePin::for_route(points, self.settings.label_max_lines) {
            engine
                .add_marker(map, &pin)
                .with_context(|| format!("failed to add pin {}", pin.number))?;
        }

        let bounds = BoundingBox::from_points(points.iter().map(|p| (p.lat, p.lng)))
            .context("route has no bounds")?;
        engine
            .fit_bounds(map, &bounds, self.settings.fit_padding_px)
            .context("failed to fit route bounds")?;

        let timeout = self.settings.tile_wait_timeout();
        if tiles_or_timeout(engine.tiles_loaded(map), timeout).await == TileWait::TimedOut {
            log_debug!("tiles still loading after {}ms, capturing anyway", timeout.as_millis());
        }

        let image = engine.rasterize(map).await?;
        drop(guard);
        Ok(image)
    }
}

/// Neutral image of exactly `width`×`height` with a short caption.
pub fn placeholder_image(width: u32, height: u32) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(width, height, PLACEHOLDER_BACKGROUND);

    let px = [24.0, 18.0, 12.0]
        .into_iter()
        .find(|&px| text::measure(PLACEHOLDER_CAPTION, px).0 + 20 <= width)
        .unwrap_or(12.0);
    let (text_w, text_h) = text::measure(PLACEHOLDER_CAPTION, px);
    let x = ((width as i64 - text_w as i64) / 2).max(10);
    let y = (height as i64 - text_h as i64) / 2;
    text::draw(&mut image, x, y, PLACEHOLDER_CAPTION, px, PLACEHOLDER_INK);
    image
}

fn placeholder(width: u32, height: u32) -> SnapshotResult {
    match EncodedImage::from_rgba(&placeholder_image(width, height)) {
        Ok(encoded) => SnapshotResult::Placeholder(encoded),
        Err(err) => {
            log_error!("failed to encode placeholder: {err:#}");
            SnapshotResult::NoSnapshot
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_has_exact_size_and_caption() {
        let image = placeholder_image(320, 200);
        assert_eq!(image.dimensions(), (320, 200));
        assert_eq!(*image.get_pixel(0, 0), PLACEHOLDER_BACKGROUND);

        let ink = image.pixels().filter(|p| **p != PLACEHOLDER_BACKGROUND).count();
        assert!(ink > 0);
        // Caption sits on the middle rows only.
        assert!((0..320).all(|x| *image.get_pixel(x, 10) == PLACEHOLDER_BACKGROUND));
    }

    #[test]
    fn tiny_placeholder_still_encodes() {
        let result = placeholder(4, 3);
        let image = result.image().unwrap();
        assert_eq!((image.width, image.height), (4, 3));
        assert!(image.data_url.starts_with(DATA_URL_PREFIX));

        let decoded = image::load_from_memory(&image.png_bytes().unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn cache_evicts_oldest_first() {
        let mut cache = SnapshotCache::new(2);
        let a = cache.slot("a");
        let b = cache.slot("b");
        assert!(Arc::ptr_eq(&cache.slot("a"), &a));

        cache.slot("c");
        assert!(!Arc::ptr_eq(&cache.slot("a"), &a));
        assert!(!Arc::ptr_eq(&cache.slot("b"), &b));
    }

    #[test]
    fn eviction_only_drops_the_matching_slot() {
        let mut cache = SnapshotCache::new(4);
        let current = cache.slot("route");
        let stale = Slot::default();

        cache.evict("route", &stale);
        assert!(Arc::ptr_eq(&cache.slot("route"), &current));

        cache.evict("route", &current);
        assert!(!Arc::ptr_eq(&cache.slot("route"), &current));
    }

    #[test]
    fn cache_key_ignores_label_noise() {
        let options = SnapshotOptions {
            width: 800,
            height: 480,
            zoom: 10.0,
        };
        let a = cache_key(&[RoutePoint::labeled(52.0, 21.0, " Old  Town ,Warsaw")], &options);
        let b = cache_key(&[RoutePoint::labeled(52.0, 21.0, "Old Town, Warsaw")], &options);
        assert_eq!(a, b);
    }
}
