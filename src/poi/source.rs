use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::error::FetchError;
use super::feature::{PoiQuery, TaggedPointFeature};

/// The rate-limited POI query service.
///
/// Implementations should stop early once `cancel` fires, but the scheduler
/// does not rely on it: a superseded response is discarded on arrival.
pub trait PoiSource: Send + Sync + 'static {
    fn fetch(
        &self,
        query: PoiQuery,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Vec<TaggedPointFeature>, FetchError>> + Send;
}

impl<S: PoiSource> PoiSource for Arc<S> {
    fn fetch(
        &self,
        query: PoiQuery,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Vec<TaggedPointFeature>, FetchError>> + Send {
        (**self).fetch(query, cancel)
    }
}
