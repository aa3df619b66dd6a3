use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::wikicode::{self, Node, Wikicode};

static STANDALONE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(\[\[.*?\]\])[ \t]*\r?$").unwrap());

/// Heading titles as displayed, optionally only those at `level`.
pub fn headings(code: &Wikicode, level: Option<u8>) -> Vec<String> {
    code.headings()
        .filter(|h| level.map_or(true, |l| h.level == l))
        .map(|h| h.title.strip_code().trim().to_string())
        .collect()
}

/// Body of the first section titled `heading`, subsections included,
/// without the heading line.
pub fn section_content(code: &Wikicode, heading: &str) -> Option<String> {
    let mut nodes = code.nodes.iter();
    let level = nodes.by_ref().find_map(|n| match n {
        Node::Heading(h) if h.title.strip_code().trim() == heading => Some(h.level),
        _ => None,
    })?;

    let mut body = String::new();
    for node in nodes {
        if let Node::Heading(h) = node {
            if h.level <= level {
                break;
            }
        }
        body.push_str(&node.to_string());
    }

    let body = body.strip_prefix('\n').unwrap_or(&body);
    Some(body.lines().collect::<Vec<_>>().join("\n"))
}

/// Category names of links that sit alone on their line.
///
/// Category links inside running prose are ignored: only the tag block at
/// the bottom of a page counts.
pub fn standalone_categories(src: &str) -> BTreeSet<String> {
    STANDALONE_LINK_RE
        .captures_iter(src)
        .filter_map(|caps| {
            if !caps[1].contains("Category") {
                return None;
            }
            let code = wikicode::parse(&caps[1]);
            let link = code.wikilinks().next()?;
            let name = link.title.rsplit(':').next().unwrap_or_default().trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::wikicode::parse;

    const PAGE: &str = "Intro\n==Gifting==\n{{GiftByItem\n|love=Emily, Haley\n}}\n===Notes===\nnote\n==History==\nold\n";

    #[test]
    fn heading_levels() {
        let code = parse(PAGE);
        assert_eq!(headings(&code, None), vec!["Gifting", "Notes", "History"]);
        assert_eq!(headings(&code, Some(3)), vec!["Notes"]);
    }

    #[test]
    fn section_includes_subsections() {
        let code = parse(PAGE);
        let body = section_content(&code, "Gifting").unwrap();
        assert_eq!(body, "{{GiftByItem\n|love=Emily, Haley\n}}\n===Notes===\nnote");
    }

    #[test]
    fn last_section_runs_to_end() {
        let code = parse(PAGE);
        assert_eq!(section_content(&code, "History").as_deref(), Some("old"));
    }

    #[test]
    fn missing_section() {
        assert_eq!(section_content(&parse(PAGE), "Trivia"), None);
    }

    #[test]
    fn only_standalone_category_links() {
        let src = "See [[:Category:Fish]] for more.\n[[Category:Fish]]\n  [[Category:Artisan Goods]]  \n[[Pierre]]\n";
        let cats = standalone_categories(src);
        assert_eq!(
            cats.into_iter().collect::<Vec<_>>(),
            vec!["Artisan Goods".to_string(), "Fish".to_string()]
        );
    }
}
