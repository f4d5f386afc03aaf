//! POI overlay scheduling and off-screen route snapshots for the travel
//! journal map.
//!
//! The map screen attaches an [`OverlayController`] and forwards viewport
//! changes; the export pipeline calls [`SnapshotGenerator::capture`] with a
//! route and gets back a PNG data URL.

pub mod geo;
pub mod overlay;
pub mod palette;
pub mod poi;
pub mod settings;
pub mod snapshot;
pub mod utils;

pub use geo::{BoundingBox, Viewport, ViewportQueryKey};
pub use overlay::{OverlayController, OverlayPhase, OverlayStatus};
pub use poi::{FetchError, OverpassClient, PoiCategory, PoiLayer, PoiSource, TaggedPointFeature};
pub use settings::{OverlaySettings, SettingsStore, SnapshotSettings};
pub use snapshot::{
    EncodedImage, HttpTileProvider, MapEngine, RasterMapEngine, RoutePoint, SnapshotGenerator,
    SnapshotOptions, SnapshotResult,
};
pub use utils::init_logging;
