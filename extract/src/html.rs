//! HTML-to-text conversion for email parts.
//!
//! Link targets and images are dropped, table rows stay on one line with
//! ` | ` between cells, and no line wrapping is applied.

use std::sync::LazyLock;

use regex::Regex;

// SAFETY: These regexes are compile-time constants and are validated by tests.
static HTML_HINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(html|body|div|p|br|table|span)\b").expect("static regex must compile")
});
static HIDDEN_BLOCK_RES: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?is)<script\b.*?</script\s*>").expect("static regex must compile"),
        Regex::new(r"(?is)<style\b.*?</style\s*>").expect("static regex must compile"),
        Regex::new(r"(?is)<head\b.*?</head\s*>").expect("static regex must compile"),
    ]
});
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static regex must compile"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex must compile"));
static IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").expect("static regex must compile"));
static CELL_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</t[dh]\s*>").expect("static regex must compile"));
static ROW_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</tr\s*>").expect("static regex must compile"));
static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("static regex must compile"));
static LINE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</?(p|div|h[1-6]|ul|ol|table|blockquote|pre)\b[^>]*>")
        .expect("static regex must compile")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex must compile"));
static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex must compile"));

/// Whether `text` looks like an HTML document or fragment.
pub fn looks_like_html(text: &str) -> bool {
    HTML_HINT_RE.is_match(text)
}

/// Converts HTML markup to plain text.
///
/// # Examples
///
/// ```
/// use amendment_extract::html::html_to_text;
///
/// let text = html_to_text("<p>Clause: <a href=\"https://x.org\">4.a</a></p><img src=\"logo.png\">");
/// assert_eq!(text, "Clause: 4.a");
/// ```
pub fn html_to_text(html: &str) -> String {
    let mut text = html.to_string();
    for re in HIDDEN_BLOCK_RES.iter() {
        text = re.replace_all(&text, "").into_owned();
    }
    text = COMMENT_RE.replace_all(&text, "").into_owned();
    // Source line breaks carry no meaning in HTML.
    text = WHITESPACE_RE.replace_all(&text, " ").into_owned();
    text = IMG_RE.replace_all(&text, "").into_owned();
    text = CELL_END_RE.replace_all(&text, " | ").into_owned();
    text = ROW_END_RE.replace_all(&text, "\n").into_owned();
    text = LIST_ITEM_RE.replace_all(&text, "\n* ").into_owned();
    text = LINE_BREAK_RE.replace_all(&text, "\n").into_owned();
    text = TAG_RE.replace_all(&text, "").into_owned();

    let decoded = html_escape::decode_html_entities(&text);
    let lines: Vec<&str> = decoded
        .lines()
        .map(|line| line.trim().trim_end_matches('|').trim_end())
        .collect();
    let joined = lines.join("\n");
    BLANK_RUN_RE.replace_all(&joined, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_html() {
        assert!(looks_like_html("<html><body>x</body></html>"));
        assert!(looks_like_html("Hello<BR>there"));
        assert!(!looks_like_html("Submitter: France\nClause: 4"));
        assert!(!looks_like_html("a < b and <brief> notes"));
    }

    #[test]
    fn test_keeps_link_text_and_drops_targets() {
        let text = html_to_text(r#"<div>See <a href="https://un.org/res">the draft</a> now</div>"#);
        assert_eq!(text, "See the draft now");
        assert!(!text.contains("un.org"));
    }

    #[test]
    fn test_preserves_table_rows() {
        let html = "<table><tr><td>Clause</td><td>4.a</td></tr>\n<tr><th>Type</th><th>ADD</th></tr></table>";
        assert_eq!(html_to_text(html), "Clause | 4.a\nType | ADD");
    }

    #[test]
    fn test_breaks_paragraphs_and_decodes_entities() {
        let html = "<html><head><title>t</title><style>p{}</style></head><body>\
                    <p>Submitter: C&ocirc;te d&#39;Ivoire</p><p>Reason: A &amp; B</p>\
                    <!-- hidden --><script>alert(1)</script></body></html>";
        assert_eq!(
            html_to_text(html),
            "Submitter: Côte d'Ivoire\n\nReason: A & B"
        );
    }

    #[test]
    fn test_does_not_wrap_long_lines() {
        let long = "word ".repeat(60);
        let text = html_to_text(&format!("<p>{long}</p>"));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_lists_render_as_bullets() {
        assert_eq!(
            html_to_text("<ul><li>one</li><li>two</li></ul>"),
            "* one\n* two"
        );
    }
}
