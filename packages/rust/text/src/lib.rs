//! Plain-text extraction from compiler-rendered HTML.
//!
//! The search index stores text, not markup: tags are dropped, entities are
//! resolved by the HTML parser, and runs of whitespace collapse to one space.

use scraper::Html;
use scraper::node::Node;

/// Elements whose text never reaches the index.
const SKIP_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "svg"];

/// Elements that separate words even without surrounding whitespace.
const BLOCK_TAGS: [&str; 24] = [
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "li", "p", "pre", "section", "td",
    "tr",
];

/// Extract the text content of an HTML fragment.
pub fn html_to_text(html: &str) -> String {
    if !html.contains(['<', '&']) {
        return collapse_whitespace(html);
    }

    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());

    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(text) => {
                let hidden = node.ancestors().any(|a| match a.value() {
                    Node::Element(el) => is_skipped(el),
                    _ => false,
                });
                if !hidden {
                    out.push_str(text);
                }
            }
            Node::Element(el) if BLOCK_TAGS.contains(&el.name()) => out.push(' '),
            _ => {}
        }
    }

    collapse_whitespace(&out)
}

/// Lowercased alphanumeric terms of `text`, single characters dropped.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 1)
        .map(str::to_lowercase)
}

fn is_skipped(el: &scraper::node::Element) -> bool {
    SKIP_TAGS.contains(&el.name()) || el.classes().any(|c| c == "headerlink")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_resolves_entities() {
        let html = "<h1>Intro &amp; Setup<a class=\"headerlink\" href=\"#intro\">¶</a></h1>\
                    <p>Use <code>widget&lt;T&gt;</code> here.</p>";
        assert_eq!(html_to_text(html), "Intro & Setup Use widget<T> here.");
    }

    #[test]
    fn block_elements_separate_words() {
        assert_eq!(html_to_text("<p>one</p><p>two</p><ul><li>a</li><li>b</li></ul>"), "one two a b");
    }

    #[test]
    fn script_and_style_are_dropped() {
        let html = "<p>shown</p><script>var hidden = 1;</script><style>p { color: red }</style>";
        assert_eq!(html_to_text(html), "shown");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(html_to_text("  Getting   Started \n"), "Getting Started");
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn tokenize_lowercases_and_splits() {
        let terms: Vec<String> = tokenize("Widget-Toolkit: a FAST v2 API").collect();
        assert_eq!(terms, ["widget", "toolkit", "fast", "v2", "api"]);
    }
}
