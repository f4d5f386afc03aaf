use std::sync::{Arc, RwLock};

use tokio::sync::watch;

use super::render::RenderedMarker;

/// Host-mounted marker group. Cloning yields another handle onto the same
/// group; the overlay only ever clears it or swaps its whole contents.
#[derive(Clone)]
pub struct PoiLayer {
    markers: Arc<RwLock<Vec<RenderedMarker>>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for PoiLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl PoiLayer {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            markers: Arc::new(RwLock::new(Vec::new())),
            revision: Arc::new(revision),
        }
    }

    /// Swaps in a new marker set in one step.
    pub fn replace(&self, markers: Vec<RenderedMarker>) {
        {
            let mut guard = self
                .markers
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = markers;
        }
        self.bump();
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    pub fn markers(&self) -> Vec<RenderedMarker> {
        self.markers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.markers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Incremented on every clear/replace so the host knows to redraw.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}
