/// Collapse every run of whitespace to a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Plain text from an HTML fragment, whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), 1000) {
        Ok(text) => collapse_whitespace(&text),
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            collapse_whitespace(html)
        }
    }
}
