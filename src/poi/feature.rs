use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geo::BoundingBox;

/// One point of interest as returned by the query service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedPointFeature {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub title: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

impl TaggedPointFeature {
    /// Tag value, treating an empty string as absent.
    pub fn tag(&self, key: &str) -> Option<&str> {
        tag_value(&self.tags, key)
    }
}

pub(crate) fn tag_value<'a>(tags: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    tags.get(key)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoiCategory {
    Culture,
    Scenic,
    Entertainment,
    Religion,
    History,
    Attractions,
}

impl PoiCategory {
    pub const ALL: [PoiCategory; 6] = [
        PoiCategory::Culture,
        PoiCategory::Scenic,
        PoiCategory::Entertainment,
        PoiCategory::Religion,
        PoiCategory::History,
        PoiCategory::Attractions,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PoiCategory::Culture => "Culture",
            PoiCategory::Scenic => "Scenic",
            PoiCategory::Entertainment => "Entertainment",
            PoiCategory::Religion => "Religion",
            PoiCategory::History => "History",
            PoiCategory::Attractions => "Attractions",
        }
    }
}

/// What the scheduler asks a [`PoiSource`](super::PoiSource) for.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiQuery {
    pub bbox: BoundingBox,
    /// `None` means every category.
    pub categories: Option<Vec<PoiCategory>>,
}
