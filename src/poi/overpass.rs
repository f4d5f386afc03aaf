use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::settings::OverlaySettings;

use super::classify::type_label;
use super::error::FetchError;
use super::feature::{tag_value, PoiCategory, PoiQuery, TaggedPointFeature};
use super::source::PoiSource;

const ENABLE_LOGS: bool = true;
use crate::log_debug;

/// Upper bound on elements per response.
const RESULT_LIMIT: usize = 400;
const USER_AGENT: &str = concat!("travel-overlay/", env!("CARGO_PKG_VERSION"));

/// Overpass QL tag selectors for each category.
fn selectors(category: PoiCategory) -> &'static [&'static str] {
    match category {
        PoiCategory::Culture => &[r#"["tourism"="museum"]"#],
        PoiCategory::Scenic => &[r#"["tourism"="viewpoint"]"#],
        PoiCategory::Entertainment => &[r#"["tourism"~"^(zoo|theme_park)$"]"#],
        PoiCategory::Religion => &[r#"["amenity"="place_of_worship"]["name"]"#],
        PoiCategory::History => &[r#"["historic"]["name"]"#],
        PoiCategory::Attractions => &[r#"["tourism"="attraction"]"#],
    }
}

/// Builds the Overpass QL text for `query`.
pub fn build_query(query: &PoiQuery, timeout_secs: u64) -> String {
    let categories: Vec<PoiCategory> = match &query.categories {
        Some(selected) => {
            let mut selected = selected.clone();
            selected.sort();
            selected.dedup();
            selected
        }
        None => PoiCategory::ALL.to_vec(),
    };

    let b = &query.bbox;
    let bbox = format!("({:.6},{:.6},{:.6},{:.6})", b.south, b.west, b.north, b.east);

    let mut ql = format!("[out:json][timeout:{timeout_secs}];\n(\n");
    for category in categories {
        for selector in selectors(category) {
            let _ = writeln!(ql, "  nwr{selector}{bbox};");
        }
    }
    let _ = write!(ql, ");\nout center tags {RESULT_LIMIT};");
    ql
}

#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: u64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<OverpassCenter>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct OverpassCenter {
    pub lat: f64,
    pub lon: f64,
}

/// Turns raw elements into point features. Ways and relations use their
/// center; elements with no position at all are left out.
pub fn decode_elements(response: OverpassResponse, lang: &str) -> Vec<TaggedPointFeature> {
    let localized_name = format!("name:{lang}");
    response
        .elements
        .into_iter()
        .filter_map(|element| {
            let (lat, lng) = match (element.lat, element.lon, &element.center) {
                (Some(lat), Some(lon), _) => (lat, lon),
                (_, _, Some(center)) => (center.lat, center.lon),
                _ => return None,
            };

            let title = tag_value(&element.tags, &localized_name)
                .or_else(|| tag_value(&element.tags, "name"))
                .map(str::to_string)
                .unwrap_or_else(|| type_label(&element.tags));

            Some(TaggedPointFeature {
                id: format!("{}/{}", element.kind, element.id),
                lat,
                lng,
                source_url: Some(format!(
                    "https://www.openstreetmap.org/{}/{}",
                    element.kind, element.id
                )),
                title,
                tags: element.tags,
            })
        })
        .collect()
}

/// [`PoiSource`] backed by an Overpass API interpreter endpoint.
pub struct OverpassClient {
    http: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
    lang: String,
}

impl OverpassClient {
    pub fn new(settings: &OverlaySettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.request_timeout_secs + 5))
            .build()
            .context("failed to build Overpass HTTP client")?;

        Ok(Self {
            http,
            endpoint: settings.overpass_url.clone(),
            timeout_secs: settings.request_timeout_secs,
            lang: settings.description_lang.clone(),
        })
    }

    async fn execute(&self, query: &PoiQuery) -> Result<Vec<TaggedPointFeature>, FetchError> {
        let ql = build_query(query, self.timeout_secs);
        let body: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("data", &ql)
            .finish();

        log_debug!("overpass query for {:?}", query.bbox);

        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|err| FetchError::classify_message(&err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| FetchError::classify_message(&err.to_string()))?;

        if !status.is_success() {
            return Err(FetchError::classify_status(status.as_u16(), &text));
        }

        let parsed: OverpassResponse =
            serde_json::from_str(&text).map_err(|err| FetchError::Decode(err.to_string()))?;

        // Overpass answers 200 with a `remark` when the query ran out of time
        // or memory on the server.
        if parsed.elements.is_empty() {
            if let Some(remark) = parsed.remark.as_deref() {
                if let err @ (FetchError::Busy(_) | FetchError::RateLimited { .. }) =
                    FetchError::classify_message(remark)
                {
                    return Err(err);
                }
            }
        }

        Ok(decode_elements(parsed, &self.lang))
    }
}

impl PoiSource for OverpassClient {
    fn fetch(
        &self,
        query: PoiQuery,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<Vec<TaggedPointFeature>, FetchError>> + Send {
        async move {
            tokio::select! {
                result = self.execute(&query) => result,
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::BoundingBox;

    fn query(categories: Option<Vec<PoiCategory>>) -> PoiQuery {
        PoiQuery {
            bbox: BoundingBox::new(52.1, 20.9, 52.3, 21.1),
            categories,
        }
    }

    #[test]
    fn unfiltered_query_covers_every_category() {
        let ql = build_query(&query(None), 25);
        assert!(ql.starts_with("[out:json][timeout:25];"));
        assert!(ql.contains(r#"nwr["tourism"="museum"](52.100000,20.900000,52.300000,21.100000);"#));
        assert!(ql.contains(r#"["historic"]"#));
        assert!(ql.contains(r#"["tourism"="attraction"]"#));
        assert!(ql.ends_with("out center tags 400;"));
    }

    #[test]
    fn filtered_query_only_lists_selected_categories() {
        let ql = build_query(
            &query(Some(vec![PoiCategory::Scenic, PoiCategory::Scenic])),
            10,
        );
        assert_eq!(ql.matches("nwr").count(), 1);
        assert!(ql.contains("viewpoint"));
        assert!(!ql.contains("museum"));
    }

    #[test]
    fn elements_decode_into_features() {
        let json = r#"{
            "elements": [
                {"type": "node", "id": 1, "lat": 52.2, "lon": 21.0,
                 "tags": {"name": "Zamek", "name:en": "Royal Castle", "historic": "castle"}},
                {"type": "way", "id": 2, "center": {"lat": 52.21, "lon": 21.01},
                 "tags": {"tourism": "museum"}},
                {"type": "relation", "id": 3, "tags": {"name": "No position"}}
            ]
        }"#;
        let response: OverpassResponse = serde_json::from_str(json).unwrap();
        let features = decode_elements(response, "en");

        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, "node/1");
        assert_eq!(features[0].title, "Royal Castle");
        assert_eq!(
            features[0].source_url.as_deref(),
            Some("https://www.openstreetmap.org/node/1")
        );
        assert_eq!(features[1].id, "way/2");
        assert_eq!((features[1].lat, features[1].lng), (52.21, 21.01));
        assert_eq!(features[1].title, "Museum");
    }
}
