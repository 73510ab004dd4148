//! Markup → plain text extraction for post bodies.
//!
//! Post content arrives as an HTML fragment. It is parsed with the HTML5
//! tree-construction rules (`scraper`, backed by html5ever), so stray `<`,
//! bare `&`, unclosed elements and raw-text elements behave as in a browser.
//! The tree is then walked in document order keeping only character data and
//! `<br>` line breaks.

use scraper::{Html, Node};

/// Convert a post body to plain text.
///
/// Text nodes lose leading/trailing CR/LF only; every `br` element becomes a `\n`.
/// HTML5 parsing recovers from any input, so markup never leaks into the result.
pub fn extract_text(input: &str) -> String {
    let doc = Html::parse_fragment(input);

    let mut out = String::with_capacity(input.len());
    // `br` is a void element and never has children, so emitting its newline
    // on entry matches emitting it after its (empty) subtree.
    for node in doc.tree.root().descendants() {
        match node.value() {
            Node::Text(text) => {
                let data = text.trim_matches(|c| c == '\r' || c == '\n');
                if !data.is_empty() {
                    out.push_str(data);
                }
            }
            Node::Element(el) if el.name().eq_ignore_ascii_case("br") => out.push('\n'),
            _ => {}
        }
    }
    out
}
