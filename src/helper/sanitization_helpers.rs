use std::collections::HashSet;

/// Strips all HTML tags from input, leaving readable plain text.
/// Used for captions that only arrive as HTML.
pub fn strip_all_html(input: &str) -> String {
    let cleaned = ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string();

    // Ammonia re-escapes text; the editor wants it decoded.
    html_escape::decode_html_entities(&cleaned).trim().to_string()
}
