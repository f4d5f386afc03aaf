pub mod engine;
pub mod error;
pub mod generator;
pub mod glyphs;
pub mod pins;
pub mod raster;
pub mod static_url;
pub mod text;
pub mod tiles;
pub mod wait;

pub use engine::{MapEngine, MapHandle, MapOptions, SurfaceGuard};
pub use error::RasterizeError;
pub use generator::{EncodedImage, SnapshotGenerator, SnapshotOptions, SnapshotResult};
pub use pins::{PinKind, RoutePin, RoutePoint};
pub use raster::RasterMapEngine;
pub use static_url::{static_map_url, StaticMapOptions};
pub use tiles::{HttpTileProvider, Tile, TileProvider};
pub use wait::{tiles_or_timeout, TileWait};
