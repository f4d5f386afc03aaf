pub mod classify;
pub mod error;
pub mod feature;
pub mod layer;
pub mod overpass;
pub mod popup;
pub mod render;
pub mod source;

pub use classify::{classify, type_label, CategoryStyle, MarkerSizing};
pub use error::FetchError;
pub use feature::{PoiCategory, PoiQuery, TaggedPointFeature};
pub use layer::PoiLayer;
pub use overpass::OverpassClient;
pub use popup::PopupContent;
pub use render::{PoiRenderer, RenderReport, RenderedMarker};
pub use source::PoiSource;
