use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use image::{imageops, Rgba, RgbaImage};
use tokio::task::JoinSet;

use crate::geo::mercator::{fit_zoom, project, unproject, MAX_ZOOM, TILE_SIZE};
use crate::geo::BoundingBox;
use crate::palette;

use super::engine::{MapEngine, MapHandle, MapOptions};
use super::error::RasterizeError;
use super::pins::RoutePin;
use super::text;
use super::tiles::{Tile, TileProvider};

const ENABLE_LOGS: bool = false;
use crate::log_debug;

const PIN_RADIUS: i64 = 11;
const PIN_STROKE: i64 = 2;
const BADGE_RADIUS: i64 = 7;
const CALLOUT_PADDING: i64 = 4;
const CALLOUT_LINE_GAP: i64 = 3;
const CALLOUT_OFFSET: i64 = 6;
const BADGE_TEXT_PX: f32 = 10.0;
const CALLOUT_TEXT_PX: f32 = 11.0;

type TileKey = (u32, u32, u32);

struct MapView {
    surface: String,
    width: u32,
    height: u32,
    center: (f64, f64),
    zoom: f64,
    pins: Vec<RoutePin>,
    tiles: HashMap<TileKey, Tile>,
}

#[derive(Default)]
struct EngineState {
    next_map: u64,
    surfaces: HashMap<String, (u32, u32)>,
    maps: HashMap<MapHandle, MapView>,
}

/// Pixel frame of a map view at its integer tile zoom.
struct Frame {
    zoom: u32,
    left: f64,
    top: f64,
    width: u32,
    height: u32,
}

impl Frame {
    fn of(view: &MapView) -> Self {
        let zoom = view.zoom.round().clamp(0.0, MAX_ZOOM) as u32;
        let (cx, cy) = project(view.center.0, view.center.1, zoom as f64);
        Self {
            zoom,
            left: cx - view.width as f64 / 2.0,
            top: cy - view.height as f64 / 2.0,
            width: view.width,
            height: view.height,
        }
    }

    fn to_pixel(&self, lat: f64, lng: f64) -> (i64, i64) {
        let (x, y) = project(lat, lng, self.zoom as f64);
        ((x - self.left).round() as i64, (y - self.top).round() as i64)
    }

    /// Visible tiles with the pixel offset of their top-left corner.
    fn tiles(&self) -> Vec<(TileKey, i64, i64)> {
        let size = TILE_SIZE;
        let count = 1_i64 << self.zoom;
        let x0 = (self.left / size).floor() as i64;
        let x1 = ((self.left + self.width as f64 - 1.0) / size).floor() as i64;
        let y0 = (self.top / size).floor() as i64;
        let y1 = ((self.top + self.height as f64 - 1.0) / size).floor() as i64;

        let mut out = Vec::new();
        for ty in y0.max(0)..=y1.min(count - 1) {
            for tx in x0..=x1 {
                let wrapped = tx.rem_euclid(count) as u32;
                let offset_x = (tx as f64 * size - self.left).round() as i64;
                let offset_y = (ty as f64 * size - self.top).round() as i64;
                out.push(((self.zoom, wrapped, ty as u32), offset_x, offset_y));
            }
        }
        out
    }
}

/// Software Web-Mercator renderer: composes tiles from a [`TileProvider`]
/// and draws route pins on top. Keeps track of live surfaces and maps so
/// callers can check nothing leaked.
pub struct RasterMapEngine<P: TileProvider> {
    provider: Arc<P>,
    state: Mutex<EngineState>,
}

impl<P: TileProvider> RasterMapEngine<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn live_surfaces(&self) -> usize {
        self.lock().surfaces.len()
    }

    pub fn live_maps(&self) -> usize {
        self.lock().maps.len()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_map<T>(&self, map: MapHandle, f: impl FnOnce(&mut MapView) -> T) -> Result<T> {
        let mut state = self.lock();
        let view = state
            .maps
            .get_mut(&map)
            .ok_or_else(|| anyhow!("unknown map {map:?}"))?;
        Ok(f(view))
    }

    fn store_tile(&self, map: MapHandle, key: TileKey, tile: Tile) {
        if let Some(view) = self.lock().maps.get_mut(&map) {
            view.tiles.insert(key, tile);
        }
    }

    fn draw(&self, map: MapHandle) -> Result<RgbaImage, RasterizeError> {
        let state = self.lock();
        let view = state
            .maps
            .get(&map)
            .ok_or_else(|| RasterizeError::Surface(format!("unknown map {map:?}")))?;
        if !state.surfaces.contains_key(&view.surface) {
            return Err(RasterizeError::Surface(format!(
                "surface {} is gone",
                view.surface
            )));
        }

        let frame = Frame::of(view);
        let mut canvas = RgbaImage::from_pixel(view.width, view.height, color(palette::SURFACE_MUTED));

        for (key, offset_x, offset_y) in frame.tiles() {
            let Some(tile) = view.tiles.get(&key) else {
                continue;
            };
            if tile.tainted {
                return Err(RasterizeError::Tainted);
            }
            imageops::overlay(&mut canvas, &tile.image, offset_x, offset_y);
        }

        for pin in &view.pins {
            let (x, y) = frame.to_pixel(pin.lat, pin.lng);
            draw_pin(&mut canvas, x, y, pin);
        }
        // Callouts go last so no pin covers a label.
        for pin in &view.pins {
            let (x, y) = frame.to_pixel(pin.lat, pin.lng);
            draw_callout(&mut canvas, x, y, &pin.label_lines);
        }

        Ok(canvas)
    }
}

impl<P: TileProvider> MapEngine for RasterMapEngine<P> {
    fn create_surface(&self, id: &str, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            bail!("surface {id} must not be empty ({width}x{height})");
        }
        let mut state = self.lock();
        if state.surfaces.contains_key(id) {
            bail!("surface {id} already exists");
        }
        state.surfaces.insert(id.to_string(), (width, height));
        Ok(())
    }

    fn create_map(&self, surface: &str, options: MapOptions) -> Result<MapHandle> {
        let mut state = self.lock();
        let &(width, height) = state
            .surfaces
            .get(surface)
            .ok_or_else(|| anyhow!("unknown surface {surface}"))?;

        state.next_map += 1;
        let handle = MapHandle(state.next_map);
        state.maps.insert(
            handle,
            MapView {
                surface: surface.to_string(),
                width,
                height,
                center: options.center,
                zoom: options.zoom.clamp(0.0, MAX_ZOOM),
                pins: Vec::new(),
                tiles: HashMap::new(),
            },
        );
        Ok(handle)
    }

    fn add_marker(&self, map: MapHandle, pin: &RoutePin) -> Result<()> {
        self.with_map(map, |view| view.pins.push(pin.clone()))
    }

    fn fit_bounds(&self, map: MapHandle, bounds: &BoundingBox, padding_px: u32) -> Result<()> {
        self.with_map(map, |view| {
            view.zoom = fit_zoom(bounds, view.width, view.height, padding_px);
            // Center in projected space so tall boxes stay balanced.
            let (x0, y0) = project(bounds.north, bounds.west, 0.0);
            let (x1, y1) = project(bounds.south, bounds.east, 0.0);
            view.center = unproject((x0 + x1) / 2.0, (y0 + y1) / 2.0, 0.0);
        })
    }

    fn tiles_loaded(&self, map: MapHandle) -> impl Future<Output = ()> + Send {
        let wanted: Vec<TileKey> = {
            let state = self.lock();
            state
                .maps
                .get(&map)
                .map(|view| {
                    let frame = Frame::of(view);
                    frame
                        .tiles()
                        .into_iter()
                        .map(|(key, _, _)| key)
                        .filter(|key| !view.tiles.contains_key(key))
                        .collect()
                })
                .unwrap_or_default()
        };
        let provider = self.provider.clone();

        async move {
            let mut pending = JoinSet::new();
            for key in wanted {
                let provider = provider.clone();
                pending.spawn(async move {
                    let (z, x, y) = key;
                    (key, provider.fetch_tile(z, x, y).await)
                });
            }

            while let Some(joined) = pending.join_next().await {
                match joined {
                    Ok((key, Ok(tile))) => self.store_tile(map, key, tile),
                    Ok((key, Err(err))) => log_debug!("tile {key:?} failed: {err:#}"),
                    Err(err) => log_debug!("tile task aborted: {err}"),
                }
            }
        }
    }

    fn rasterize(
        &self,
        map: MapHandle,
    ) -> impl Future<Output = Result<RgbaImage, RasterizeError>> + Send {
        let result = self.draw(map);
        async move { result }
    }

    fn remove_map(&self, map: MapHandle) {
        self.lock().maps.remove(&map);
    }

    fn remove_surface(&self, id: &str) {
        let mut state = self.lock();
        state.surfaces.remove(id);
        state.maps.retain(|_, view| view.surface != id);
    }
}

fn color(hex: &str) -> Rgba<u8> {
    Rgba(palette::hex_to_rgba(hex).unwrap_or([0, 0, 0, 255]))
}

fn fill_circle(canvas: &mut RgbaImage, cx: i64, cy: i64, radius: i64, ink: Rgba<u8>) {
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);
    for y in (cy - radius).max(0)..=(cy + radius).min(height - 1) {
        for x in (cx - radius).max(0)..=(cx + radius).min(width - 1) {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= radius * radius {
                canvas.put_pixel(x as u32, y as u32, ink);
            }
        }
    }
}

fn fill_rect(canvas: &mut RgbaImage, x: i64, y: i64, w: i64, h: i64, ink: Rgba<u8>) {
    let (width, height) = (canvas.width() as i64, canvas.height() as i64);
    for py in y.max(0)..(y + h).min(height) {
        for px in x.max(0)..(x + w).min(width) {
            canvas.put_pixel(px as u32, py as u32, ink);
        }
    }
}

fn draw_pin(canvas: &mut RgbaImage, x: i64, y: i64, pin: &RoutePin) {
    fill_circle(canvas, x, y, PIN_RADIUS, color(pin.stroke));
    fill_circle(canvas, x, y, PIN_RADIUS - PIN_STROKE, color(pin.fill));
    fill_circle(canvas, x, y, BADGE_RADIUS, color(palette::SURFACE));

    let number = pin.number.to_string();
    let (text_w, text_h) = text::measure(&number, BADGE_TEXT_PX);
    let text_x = x - text_w as i64 / 2;
    let text_y = y - text_h as i64 / 2;
    text::draw(canvas, text_x, text_y, &number, BADGE_TEXT_PX, color(palette::TEXT));
}

fn draw_callout(canvas: &mut RgbaImage, x: i64, y: i64, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    let line_height = text::measure("", CALLOUT_TEXT_PX).1 as i64 + CALLOUT_LINE_GAP;
    let inner_w = lines
        .iter()
        .map(|line| text::measure(line, CALLOUT_TEXT_PX).0 as i64)
        .max()
        .unwrap_or(0);
    let box_w = inner_w + 2 * CALLOUT_PADDING;
    let box_h = lines.len() as i64 * line_height - CALLOUT_LINE_GAP + 2 * CALLOUT_PADDING;
    let left = x - box_w / 2;
    let top = y - PIN_RADIUS - CALLOUT_OFFSET - box_h;

    fill_rect(canvas, left - 1, top - 1, box_w + 2, box_h + 2, color(palette::BORDER));
    fill_rect(canvas, left, top, box_w, box_h, color(palette::SURFACE));
    for (index, line) in lines.iter().enumerate() {
        text::draw(
            canvas,
            left + CALLOUT_PADDING,
            top + CALLOUT_PADDING + index as i64 * line_height,
            line,
            CALLOUT_TEXT_PX,
            color(palette::TEXT),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::pins::RoutePoint;

    struct SolidTiles {
        ink: Rgba<u8>,
        tainted: bool,
    }

    impl TileProvider for SolidTiles {
        fn fetch_tile(&self, _z: u32, _x: u32, _y: u32) -> impl Future<Output = Result<Tile>> + Send {
            let tile = Tile {
                image: RgbaImage::from_pixel(256, 256, self.ink),
                tainted: self.tainted,
            };
            async move { Ok(tile) }
        }
    }

    const BLUE: Rgba<u8> = Rgba([40, 90, 200, 255]);

    fn options() -> MapOptions {
        MapOptions {
            center: (52.23, 21.01),
            zoom: 10.0,
            animate: false,
        }
    }

    #[tokio::test]
    async fn renders_tiles_and_pins() {
        let engine = RasterMapEngine::new(SolidTiles {
            ink: BLUE,
            tainted: false,
        });
        engine.create_surface("s1", 200, 120).unwrap();
        let map = engine.create_map("s1", options()).unwrap();
        let pins = RoutePin::for_route(&[RoutePoint::labeled(52.23, 21.01, "Old Town")], 3);
        engine.add_marker(map, &pins[0]).unwrap();
        engine.tiles_loaded(map).await;

        let image = engine.rasterize(map).await.unwrap();
        assert_eq!(image.dimensions(), (200, 120));
        assert_eq!(*image.get_pixel(0, 119), BLUE);
        assert_ne!(*image.get_pixel(100, 60), BLUE);

        engine.remove_map(map);
        engine.remove_surface("s1");
        assert_eq!(engine.live_maps(), 0);
        assert_eq!(engine.live_surfaces(), 0);
    }

    #[tokio::test]
    async fn tainted_tiles_refuse_readback() {
        let engine = RasterMapEngine::new(SolidTiles {
            ink: BLUE,
            tainted: true,
        });
        engine.create_surface("s1", 64, 64).unwrap();
        let map = engine.create_map("s1", options()).unwrap();
        engine.tiles_loaded(map).await;
        assert!(matches!(
            engine.rasterize(map).await,
            Err(RasterizeError::Tainted)
        ));
    }

    #[test]
    fn fit_bounds_moves_center_and_zoom() {
        let engine = RasterMapEngine::new(SolidTiles {
            ink: BLUE,
            tainted: false,
        });
        engine.create_surface("s1", 800, 480).unwrap();
        let map = engine.create_map("s1", options()).unwrap();
        let bounds = BoundingBox::new(50.0, 19.0, 54.0, 23.0);
        engine.fit_bounds(map, &bounds, 28).unwrap();

        let (center, zoom) = engine.with_map(map, |view| (view.center, view.zoom)).unwrap();
        assert_eq!(zoom, fit_zoom(&bounds, 800, 480, 28));
        assert!((center.1 - 21.0).abs() < 1e-9);
        assert!(center.0 > 52.0 && center.0 < 54.0);
    }

    #[test]
    fn callouts_keep_non_latin_labels() {
        let blank = RgbaImage::from_pixel(240, 120, color(palette::SURFACE_MUTED));
        let callout = |lines: &[&str]| {
            let mut canvas = blank.clone();
            let lines: Vec<String> = lines.iter().map(|line| line.to_string()).collect();
            draw_callout(&mut canvas, 120, 100, &lines);
            canvas
        };

        assert_ne!(callout(&["Москва"]), callout(&["??????"]));
        assert_ne!(callout(&["Łódź"]), callout(&["??D?"]));
        assert_ne!(callout(&["Москва"]), blank);
    }

    #[test]
    fn removing_a_surface_drops_its_maps() {
        let engine = RasterMapEngine::new(SolidTiles {
            ink: BLUE,
            tainted: false,
        });
        engine.create_surface("s1", 10, 10).unwrap();
        assert!(engine.create_surface("s1", 10, 10).is_err());
        engine.create_map("s1", options()).unwrap();
        engine.remove_surface("s1");
        assert_eq!(engine.live_maps(), 0);
        assert!(engine.create_map("s1", options()).is_err());
    }
}
