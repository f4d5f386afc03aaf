/// Escapes the five HTML-significant characters.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Escapes a value bound for a quoted attribute. Backticks are dropped as well
/// since some legacy parsers treat them as attribute quotes.
pub fn escape_attr(value: &str) -> String {
    escape_html(value).replace('`', "")
}

/// Cuts `value` to at most `max_chars` characters, appending `…` when cut.
pub fn truncate_with_ellipsis(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}…", &value[..byte_idx]),
        None => value.to_string(),
    }
}
