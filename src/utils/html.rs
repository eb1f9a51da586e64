// src/utils/html.rs

/// Cleans upstream text with ammonia before it is stored.
///
/// Safe inline tags (like <b>, <p>) survive. Dangerous tags such as <script>
/// are removed together with their content, and event-handler attributes are
/// stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Text content only: every tag is removed, text stays entity-escaped.
pub fn strip_tags(input: &str) -> String {
    ammonia::Builder::empty().clean(input).to_string()
}
