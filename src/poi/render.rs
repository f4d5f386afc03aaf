use serde::Serialize;

use crate::geo::is_valid_coordinate;
use crate::palette;

use super::classify::{classify, type_label, MarkerSizing};
use super::feature::{PoiCategory, TaggedPointFeature};
use super::layer::PoiLayer;
use super::popup::PopupContent;

const ENABLE_LOGS: bool = true;
use crate::log_warn;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleStyle {
    pub radius: f32,
    pub weight: f32,
    pub stroke: &'static str,
    pub fill: &'static str,
    pub fill_opacity: f32,
}

/// Halo + dot composite with its popup. Rebuilt on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedMarker {
    pub feature_id: String,
    pub lat: f64,
    pub lng: f64,
    pub category: PoiCategory,
    pub halo: CircleStyle,
    pub dot: CircleStyle,
    pub popup: PopupContent,
    pub popup_html: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub rendered: usize,
    pub skipped: usize,
}

pub struct PoiRenderer {
    lang: String,
}

impl PoiRenderer {
    /// `lang` picks `description:<lang>`/`note:<lang>` over the plain tags.
    pub fn new(lang: impl Into<String>) -> Self {
        Self { lang: lang.into() }
    }

    /// Builds markers for every usable feature and swaps them into `layer`.
    pub fn render(
        &self,
        features: &[TaggedPointFeature],
        zoom: f64,
        layer: &PoiLayer,
    ) -> RenderReport {
        let (markers, skipped) = self.build_markers(features, zoom);
        let report = RenderReport {
            rendered: markers.len(),
            skipped,
        };
        layer.replace(markers);
        report
    }

    pub fn build_markers(
        &self,
        features: &[TaggedPointFeature],
        zoom: f64,
    ) -> (Vec<RenderedMarker>, usize) {
        let sizing = MarkerSizing::for_zoom(zoom);
        let mut skipped = 0;

        let markers = features
            .iter()
            .filter_map(|feature| {
                if !is_valid_coordinate(feature.lat, feature.lng) {
                    log_warn!(
                        "skipping POI {} with invalid coordinates ({}, {})",
                        feature.id,
                        feature.lat,
                        feature.lng
                    );
                    skipped += 1;
                    return None;
                }
                Some(self.marker_for(feature, sizing))
            })
            .collect();

        (markers, skipped)
    }

    fn marker_for(&self, feature: &TaggedPointFeature, sizing: MarkerSizing) -> RenderedMarker {
        let category = classify(&feature.tags);
        let colors = category.style().marker;
        let popup = PopupContent::build(feature, category, type_label(&feature.tags), &self.lang);
        let popup_html = popup.to_html();

        RenderedMarker {
            feature_id: feature.id.clone(),
            lat: feature.lat,
            lng: feature.lng,
            category,
            halo: CircleStyle {
                radius: sizing.outer_radius,
                weight: sizing.outer_weight,
                stroke: palette::SURFACE,
                fill: palette::SURFACE,
                fill_opacity: 0.95,
            },
            dot: CircleStyle {
                radius: sizing.inner_radius,
                weight: sizing.inner_weight,
                stroke: colors.stroke,
                fill: colors.fill,
                fill_opacity: 0.9,
            },
            popup,
            popup_html,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn feature(id: &str, lat: f64, lng: f64, tags: &[(&str, &str)]) -> TaggedPointFeature {
        TaggedPointFeature {
            id: id.into(),
            lat,
            lng,
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            title: format!("Feature {id}"),
            source_url: None,
        }
    }

    #[test]
    fn out_of_range_feature_is_dropped_without_aborting() {
        let layer = PoiLayer::new();
        let features = vec![
            feature("a", 52.2, 21.0, &[("tourism", "museum")]),
            feature("bad", 181.0, 21.0, &[("tourism", "museum")]),
            feature("nan", f64::NAN, 21.0, &[]),
            feature("b", 52.3, 21.1, &[("historic", "castle")]),
        ];

        let report = PoiRenderer::new("en").render(&features, 15.0, &layer);

        assert_eq!(report, RenderReport { rendered: 2, skipped: 2 });
        let ids: Vec<_> = layer.markers().into_iter().map(|m| m.feature_id).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn render_replaces_previous_contents() {
        let layer = PoiLayer::new();
        let renderer = PoiRenderer::new("en");
        renderer.render(&[feature("a", 1.0, 1.0, &[])], 12.0, &layer);
        let before = layer.revision();
        renderer.render(&[feature("b", 2.0, 2.0, &[]), feature("c", 3.0, 3.0, &[])], 12.0, &layer);

        let ids: Vec<_> = layer.markers().into_iter().map(|m| m.feature_id).collect();
        assert_eq!(ids, ["b", "c"]);
        assert_eq!(layer.revision(), before + 1);
    }

    #[test]
    fn marker_carries_category_colors_and_zoom_sizing() {
        let (markers, _) = PoiRenderer::new("en")
            .build_markers(&[feature("v", 45.0, 7.0, &[("tourism", "viewpoint")])], 16.5);
        let marker = &markers[0];
        assert_eq!(marker.category, PoiCategory::Scenic);
        assert_eq!(marker.dot.stroke, palette::SUCCESS_DARK);
        assert_eq!(marker.halo.fill, palette::SURFACE);
        assert_eq!(marker.halo.radius, 9.0);
        assert_eq!(marker.dot.radius, 6.0);
        assert!(marker.popup_html.contains("Viewpoint"));
    }
}
