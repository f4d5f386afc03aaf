use std::future::Future;

use anyhow::Result;
use image::RgbaImage;

use crate::geo::BoundingBox;

use super::error::RasterizeError;
use super::pins::RoutePin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapOptions {
    pub center: (f64, f64),
    pub zoom: f64,
    /// Off-screen maps never animate; the field is here so engines can assert it.
    pub animate: bool,
}

/// A map renderer able to draw into invisible surfaces.
///
/// Setup and teardown are synchronous; only waiting for tiles and reading
/// pixels back are async. Teardown must tolerate unknown ids.
pub trait MapEngine: Send + Sync + 'static {
    fn create_surface(&self, id: &str, width: u32, height: u32) -> Result<()>;

    fn create_map(&self, surface: &str, options: MapOptions) -> Result<MapHandle>;

    fn add_marker(&self, map: MapHandle, pin: &RoutePin) -> Result<()>;

    fn fit_bounds(&self, map: MapHandle, bounds: &BoundingBox, padding_px: u32) -> Result<()>;

    /// Resolves once every visible tile has settled (loaded or failed).
    fn tiles_loaded(&self, map: MapHandle) -> impl Future<Output = ()> + Send;

    fn rasterize(
        &self,
        map: MapHandle,
    ) -> impl Future<Output = Result<RgbaImage, RasterizeError>> + Send;

    fn remove_map(&self, map: MapHandle);

    fn remove_surface(&self, id: &str);
}

/// Owns one off-screen surface (and the map drawn into it, once attached).
/// Dropping it removes the map first, then the surface.
pub struct SurfaceGuard<'a, E: MapEngine> {
    engine: &'a E,
    surface: String,
    map: Option<MapHandle>,
}

impl<'a, E: MapEngine> SurfaceGuard<'a, E> {
    /// Creates the surface; nothing needs tearing down if this fails.
    pub fn create(engine: &'a E, surface: String, width: u32, height: u32) -> Result<Self> {
        engine.create_surface(&surface, width, height)?;
        Ok(Self {
            engine,
            surface,
            map: None,
        })
    }

    pub fn surface(&self) -> &str {
        &self.surface
    }

    pub fn attach_map(&mut self, map: MapHandle) {
        self.map = Some(map);
    }
}

impl<E: MapEngine> Drop for SurfaceGuard<'_, E> {
    fn drop(&mut self) {
        if let Some(map) = self.map.take() {
            self.engine.remove_map(map);
        }
        self.engine.remove_surface(&self.surface);
    }
}
