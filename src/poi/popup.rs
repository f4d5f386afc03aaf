use serde::Serialize;
use url::Url;

use crate::palette;
use crate::utils::html::{escape_attr, escape_html, truncate_with_ellipsis};

use super::feature::{PoiCategory, TaggedPointFeature};

/// Longest description shown before it is cut with an ellipsis.
pub const DESCRIPTION_MAX_CHARS: usize = 220;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupLink {
    pub label: &'static str,
    pub href: String,
}

/// Structured popup payload. `to_html` is the only place values meet markup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupContent {
    pub title: String,
    pub type_label: String,
    pub category: PoiCategory,
    pub description: Option<String>,
    pub links: Vec<PopupLink>,
}

impl PopupContent {
    pub fn build(
        feature: &TaggedPointFeature,
        category: PoiCategory,
        type_label: String,
        lang: &str,
    ) -> Self {
        let localized_description = format!("description:{lang}");
        let localized_note = format!("note:{lang}");
        let description = [
            localized_description.as_str(),
            "description",
            localized_note.as_str(),
            "note",
        ]
        .iter()
        .find_map(|key| feature.tag(key))
        .map(|text| truncate_with_ellipsis(text.trim(), DESCRIPTION_MAX_CHARS));

        Self {
            title: feature.title.clone(),
            type_label,
            category,
            description,
            links: collect_links(feature),
        }
    }

    pub fn to_html(&self) -> String {
        let badge = self.category.style().badge;

        let description = self
            .description
            .as_deref()
            .map(|text| {
                format!(
                    r#"<div style="margin-top:8px;font-size:12px;line-height:1.35;color:{};opacity:0.92;word-break:break-word">{}</div>"#,
                    escape_attr(palette::TEXT),
                    escape_html(text)
                )
            })
            .unwrap_or_default();

        let buttons = if self.links.is_empty() {
            String::new()
        } else {
            let rendered: String = self
                .links
                .iter()
                .map(|link| {
                    format!(
                        r#"<a href="{}" target="_blank" rel="noopener noreferrer" style="display:inline-block;padding:8px 12px;border-radius:999px;border:1px solid {};color:{};background:{};text-decoration:none;font-weight:800;font-size:12px;line-height:1">{}</a>"#,
                        escape_attr(&link.href),
                        escape_attr(palette::BORDER),
                        escape_attr(palette::TEXT),
                        escape_attr(palette::SURFACE),
                        escape_html(link.label)
                    )
                })
                .collect();
            format!(
                r#"<div style="margin-top:10px;display:flex;flex-wrap:wrap;gap:8px">{rendered}</div>"#
            )
        };

        let footer_margin = if self.links.is_empty() { "8px" } else { "10px" };

        format!(
            concat!(
                r#"<div style="max-width:320px">"#,
                r#"<div style="background:{surface};border:1px solid {border};border-radius:14px;padding:12px 12px 10px 12px;box-shadow:{shadow}">"#,
                r#"<div style="display:flex;gap:10px;align-items:flex-start;justify-content:space-between">"#,
                r#"<div style="min-width:0">"#,
                r#"<div style="font-weight:800;line-height:1.2;font-size:14px;color:{text};word-break:break-word">{title}</div>"#,
                r#"<div style="margin-top:4px;font-size:12px;line-height:1.3;color:{muted}">{type_label}</div>"#,
                r#"</div>"#,
                r#"<div style="white-space:nowrap;padding:4px 10px;border-radius:999px;background:{badge_bg};color:{badge_fg};font-size:12px;font-weight:800;line-height:1">{category}</div>"#,
                r#"</div>"#,
                "{description}{buttons}",
                r#"<div style="margin-top:{footer_margin};padding-top:10px;border-top:1px solid {border};font-size:11px;line-height:1.2;color:{subtle}">Source: OpenStreetMap</div>"#,
                r#"</div></div>"#,
            ),
            surface = escape_attr(palette::SURFACE),
            border = escape_attr(palette::BORDER_LIGHT),
            shadow = escape_attr(palette::SHADOW_LIGHT),
            text = escape_attr(palette::TEXT),
            title = escape_html(&self.title),
            muted = escape_attr(palette::TEXT_MUTED),
            type_label = escape_html(&self.type_label),
            badge_bg = escape_attr(badge.background),
            badge_fg = escape_attr(badge.foreground),
            category = escape_html(self.category.label()),
            description = description,
            buttons = buttons,
            footer_margin = footer_margin,
            subtle = escape_attr(palette::TEXT_SUBTLE),
        )
    }
}

fn collect_links(feature: &TaggedPointFeature) -> Vec<PopupLink> {
    let mut links = Vec::new();

    if let Some(href) = feature
        .tag("website")
        .or_else(|| feature.tag("url"))
        .and_then(web_url)
    {
        links.push(PopupLink {
            label: "Website",
            href,
        });
    }

    if let Some(href) = feature.tag("wikipedia").and_then(wikipedia_url) {
        links.push(PopupLink {
            label: "Wikipedia",
            href,
        });
    } else if let Some(href) = feature.tag("wikidata").and_then(wikidata_url) {
        links.push(PopupLink {
            label: "Wikidata",
            href,
        });
    }

    if let Some(href) = feature.source_url.as_deref().and_then(web_url) {
        links.push(PopupLink {
            label: "OpenStreetMap",
            href,
        });
    }

    links
}

/// Only http(s) links make it into a popup. A bare host such as
/// `www.wawel.krakow.pl` is taken as https.
fn web_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{raw}")).ok()?,
        Err(_) => return None,
    };
    let linkable = matches!(url.scheme(), "http" | "https") && url.host_str().is_some();
    linkable.then(|| url.to_string())
}

/// `wikipedia=en:Wawel Castle` → article URL; the language prefix is dropped.
fn wikipedia_url(raw: &str) -> Option<String> {
    let title = match raw.split_once(':') {
        Some((_, rest)) => rest,
        None => raw,
    }
    .trim();
    if title.is_empty() {
        return None;
    }
    page_url("https://wikipedia.org/wiki/", title)
}

fn wikidata_url(raw: &str) -> Option<String> {
    page_url("https://www.wikidata.org/wiki/", raw.trim())
}

fn page_url(base: &str, page: &str) -> Option<String> {
    let mut url = Url::parse(base).ok()?;
    url.path_segments_mut().ok()?.pop_if_empty().push(page);
    Some(url.to_string())
}
