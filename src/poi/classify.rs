use std::collections::BTreeMap;

use serde::Serialize;

use crate::palette;

use super::feature::{tag_value, PoiCategory};

/// Predicate over a feature's tag set.
#[derive(Debug, Clone, Copy)]
enum TagRule {
    /// Tag equals one of the listed values.
    OneOf(&'static str, &'static [&'static str]),
    /// Tag is present with any non-empty value.
    Present(&'static str),
}

impl TagRule {
    fn matches(self, tags: &BTreeMap<String, String>) -> bool {
        match self {
            TagRule::OneOf(key, values) => {
                tag_value(tags, key).is_some_and(|value| values.contains(&value))
            }
            TagRule::Present(key) => tag_value(tags, key).is_some(),
        }
    }
}

/// Evaluated top to bottom; the first match wins.
const CATEGORY_RULES: &[(TagRule, PoiCategory)] = &[
    (TagRule::OneOf("tourism", &["museum"]), PoiCategory::Culture),
    (TagRule::OneOf("tourism", &["viewpoint"]), PoiCategory::Scenic),
    (
        TagRule::OneOf("tourism", &["zoo", "theme_park"]),
        PoiCategory::Entertainment,
    ),
    (
        TagRule::OneOf("amenity", &["place_of_worship"]),
        PoiCategory::Religion,
    ),
    (TagRule::Present("historic"), PoiCategory::History),
];

const TYPE_LABEL_RULES: &[(TagRule, &str)] = &[
    (TagRule::OneOf("tourism", &["museum"]), "Museum"),
    (TagRule::OneOf("tourism", &["viewpoint"]), "Viewpoint"),
    (TagRule::OneOf("tourism", &["zoo"]), "Zoo"),
    (TagRule::OneOf("tourism", &["theme_park"]), "Theme park"),
    (TagRule::OneOf("tourism", &["attraction"]), "Attraction"),
    (TagRule::OneOf("amenity", &["place_of_worship"]), "Place of worship"),
    (TagRule::OneOf("historic", &["castle"]), "Castle"),
    (TagRule::OneOf("historic", &["manor"]), "Manor"),
    (TagRule::OneOf("historic", &["fort"]), "Fort"),
    (TagRule::OneOf("historic", &["memorial"]), "Memorial"),
    (TagRule::OneOf("historic", &["monument"]), "Monument"),
    (TagRule::OneOf("historic", &["ruins"]), "Ruins"),
    (
        TagRule::OneOf("historic", &["archaeological_site"]),
        "Archaeological site",
    ),
];

const FALLBACK_TYPE_LABEL: &str = "Point on map";

pub fn classify(tags: &BTreeMap<String, String>) -> PoiCategory {
    CATEGORY_RULES
        .iter()
        .find(|(rule, _)| rule.matches(tags))
        .map(|(_, category)| *category)
        .unwrap_or(PoiCategory::Attractions)
}

/// Human-readable type. Unknown tag values are shown raw rather than hidden.
pub fn type_label(tags: &BTreeMap<String, String>) -> String {
    if let Some((_, label)) = TYPE_LABEL_RULES.iter().find(|(rule, _)| rule.matches(tags)) {
        return (*label).to_string();
    }

    ["tourism", "historic", "amenity"]
        .iter()
        .find_map(|key| tag_value(tags, key))
        .unwrap_or(FALLBACK_TYPE_LABEL)
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarkerColors {
    pub stroke: &'static str,
    pub fill: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BadgeColors {
    pub background: &'static str,
    pub foreground: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryStyle {
    pub marker: MarkerColors,
    pub badge: BadgeColors,
}

impl PoiCategory {
    pub fn style(self) -> CategoryStyle {
        let (stroke, fill, background, foreground) = match self {
            PoiCategory::History => (
                palette::ACCENT_DARK,
                palette::ACCENT_LIGHT,
                palette::ACCENT_SOFT,
                palette::ACCENT_DARK,
            ),
            PoiCategory::Culture => (
                palette::INFO_DARK,
                palette::INFO_LIGHT,
                palette::INFO_SOFT,
                palette::INFO_DARK,
            ),
            PoiCategory::Scenic => (
                palette::SUCCESS_DARK,
                palette::SUCCESS_LIGHT,
                palette::SUCCESS_SOFT,
                palette::SUCCESS_DARK,
            ),
            PoiCategory::Religion => (
                palette::WARNING_DARK,
                palette::WARNING_LIGHT,
                palette::WARNING_SOFT,
                palette::WARNING_DARK,
            ),
            PoiCategory::Entertainment => (
                palette::DANGER_DARK,
                palette::DANGER_LIGHT,
                palette::DANGER_SOFT,
                palette::DANGER_DARK,
            ),
            PoiCategory::Attractions => (
                palette::WARNING_DARK,
                palette::WARNING_LIGHT,
                palette::SURFACE_MUTED,
                palette::TEXT,
            ),
        };

        CategoryStyle {
            marker: MarkerColors { stroke, fill },
            badge: BadgeColors {
                background,
                foreground,
            },
        }
    }
}

/// Radii and stroke weights for one zoom tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerSizing {
    pub outer_radius: f32,
    pub inner_radius: f32,
    pub outer_weight: f32,
    pub inner_weight: f32,
}

/// Zoom assumed when the host reports something unusable.
const DEFAULT_ZOOM: f64 = 14.0;

impl MarkerSizing {
    pub fn for_zoom(zoom: f64) -> Self {
        let zoom = if zoom.is_finite() { zoom } else { DEFAULT_ZOOM };
        let (outer_radius, inner_radius) = if zoom >= 16.0 {
            (9.0, 6.0)
        } else if zoom >= 14.0 {
            (8.0, 5.5)
        } else if zoom >= 12.0 {
            (7.0, 5.0)
        } else {
            (6.0, 4.5)
        };

        Self {
            outer_radius,
            inner_radius,
            outer_weight: 2.0,
            inner_weight: 2.0,
        }
    }
}
