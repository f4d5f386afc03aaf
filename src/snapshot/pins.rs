use serde::{Deserialize, Serialize};

use crate::geo::is_valid_coordinate;
use crate::palette;
use crate::utils::html::{escape_html, truncate_with_ellipsis};

/// Characters per callout line before wrapping.
pub const LABEL_LINE_CHARS: usize = 26;

/// One stop on a route, as handed over by the export pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub label: Option<String>,
}

impl RoutePoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            label: None,
        }
    }

    pub fn labeled(lat: f64, lng: f64, label: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            label: Some(label.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        is_valid_coordinate(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PinKind {
    Start,
    End,
    Intermediate,
}

impl PinKind {
    /// First point starts the route, last one ends it. A lone point is a start.
    pub fn for_position(index: usize, total: usize) -> Self {
        if index == 0 {
            PinKind::Start
        } else if index + 1 == total {
            PinKind::End
        } else {
            PinKind::Intermediate
        }
    }

    pub fn fill(self) -> &'static str {
        match self {
            PinKind::Start => palette::SUCCESS,
            PinKind::End => palette::DANGER,
            PinKind::Intermediate => palette::ACCENT,
        }
    }

    pub fn stroke(self) -> &'static str {
        match self {
            PinKind::Start => palette::SUCCESS_DARK,
            PinKind::End => palette::DANGER_DARK,
            PinKind::Intermediate => palette::ACCENT_DARK,
        }
    }
}

/// Marker drawn for one route point: colored pin, numbered badge and an
/// optional label callout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePin {
    /// 1-based position along the route.
    pub number: usize,
    pub kind: PinKind,
    pub lat: f64,
    pub lng: f64,
    pub fill: &'static str,
    pub stroke: &'static str,
    pub label: Option<String>,
    pub label_lines: Vec<String>,
    pub callout_html: Option<String>,
}

impl RoutePin {
    /// Builds pins for already validated points.
    pub fn for_route(points: &[RoutePoint], max_lines: usize) -> Vec<RoutePin> {
        let total = points.len();
        points
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let kind = PinKind::for_position(index, total);
                let label = point.label.as_deref().and_then(normalize_label);
                let label_lines = label
                    .as_deref()
                    .map(|text| wrap_label(text, LABEL_LINE_CHARS, max_lines))
                    .unwrap_or_default();
                let callout_html = (!label_lines.is_empty()).then(|| callout_html(&label_lines));

                RoutePin {
                    number: index + 1,
                    kind,
                    lat: point.lat,
                    lng: point.lng,
                    fill: kind.fill(),
                    stroke: kind.stroke(),
                    label,
                    label_lines,
                    callout_html,
                }
            })
            .collect()
    }
}

/// Collapses whitespace, tightens comma spacing to `", "` and strips leading
/// or trailing separators. Blank labels become `None`.
pub fn normalize_label(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let parts: Vec<&str> = collapsed
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    let normalized = parts.join(", ");
    (!normalized.is_empty()).then_some(normalized)
}

/// Greedy word wrap into at most `max_lines` lines. Overflow is folded into
/// the last line and cut with an ellipsis.
pub fn wrap_label(text: &str, line_chars: usize, max_lines: usize) -> Vec<String> {
    if max_lines == 0 || line_chars == 0 {
        return Vec::new();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed <= line_chars || current.is_empty() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        let tail = lines.split_off(max_lines - 1).join(" ");
        lines.push(tail);
    }

    lines
        .into_iter()
        .map(|line| {
            if line.chars().count() > line_chars {
                truncate_with_ellipsis(&line, line_chars - 1)
            } else {
                line
            }
        })
        .collect()
}

fn callout_html(lines: &[String]) -> String {
    let body = lines
        .iter()
        .map(|line| escape_html(line))
        .collect::<Vec<_>>()
        .join("<br/>");
    format!(
        concat!(
            "<div class=\"travel-map-label\" style=\"background:{};color:{};",
            "border:1px solid {};border-radius:6px;padding:2px 6px;",
            "font:600 10px {};box-shadow:{};\">{}</div>"
        ),
        palette::SURFACE,
        palette::TEXT,
        palette::BORDER,
        palette::FONT_FAMILY,
        palette::SHADOW_LIGHT,
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_route_order() {
        let kinds: Vec<PinKind> = (0..4).map(|i| PinKind::for_position(i, 4)).collect();
        assert_eq!(
            kinds,
            [
                PinKind::Start,
                PinKind::Intermediate,
                PinKind::Intermediate,
                PinKind::End
            ]
        );
        assert_eq!(PinKind::for_position(0, 1), PinKind::Start);
        assert_eq!(PinKind::Start.fill(), palette::SUCCESS);
        assert_eq!(PinKind::End.fill(), palette::DANGER);
    }

    #[test]
    fn labels_are_normalized() {
        assert_eq!(
            normalize_label("  Old   Town ,Warsaw,,  Poland , ").as_deref(),
            Some("Old Town, Warsaw, Poland")
        );
        assert_eq!(normalize_label(" , \n "), None);
    }

    #[test]
    fn long_labels_are_clamped_to_max_lines() {
        let text = "Palace of Culture and Science, observation terrace on the thirtieth floor";
        let lines = wrap_label(text, 20, 3);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line.chars().count() <= 20));
        assert!(lines[2].ends_with('…'));

        let short = wrap_label("Royal Castle", 20, 3);
        assert_eq!(short, ["Royal Castle"]);
    }

    #[test]
    fn pins_carry_numbers_and_escaped_callouts() {
        let points = vec![
            RoutePoint::labeled(52.2, 21.0, "<b>Start</b>"),
            RoutePoint::new(52.3, 21.1),
            RoutePoint::labeled(52.4, 21.2, "   "),
        ];
        let pins = RoutePin::for_route(&points, 3);

        assert_eq!(pins.iter().map(|p| p.number).collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(pins[2].kind, PinKind::End);

        let callout = pins[0].callout_html.as_deref().unwrap();
        assert!(callout.contains("&lt;b&gt;Start&lt;/b&gt;"));
        assert!(!callout.contains("<b>"));
        assert!(pins[1].callout_html.is_none());
        assert!(pins[2].label.is_none());
    }
}
