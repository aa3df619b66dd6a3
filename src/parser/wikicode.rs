use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(={1,6})(.+?)(={1,6})[ \t]*$").unwrap());

/// Parsed markup. Rendering it with `Display` reproduces the source exactly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Wikicode {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Template(Template),
    Wikilink(Wikilink),
    Heading(Heading),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: Wikicode,
    pub params: Vec<Parameter>,
    raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Explicit key, or the 1-based position for positional parameters.
    pub name: String,
    pub showkey: bool,
    pub value: Wikicode,
    raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Wikilink {
    pub title: String,
    /// Display text after the pipe, parsed like any other markup.
    pub text: Option<Wikicode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    pub level: u8,
    pub title: Wikicode,
    raw: String,
}

pub fn parse(src: &str) -> Wikicode {
    let bytes = src.as_bytes();
    let mut nodes = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let at_line_start = i == 0 || bytes[i - 1] == b'\n';

        // ── Heading: == title == on its own line ──
        if at_line_start && bytes[i] == b'=' {
            let line_end = src[i..].find('\n').map_or(src.len(), |n| i + n);
            let line = &src[i..line_end];
            if let Some(heading) = parse_heading(line) {
                flush_text(src, text_start, i, &mut nodes);
                nodes.push(Node::Heading(heading));
                i = line_end;
                text_start = i;
                continue;
            }
        }

        // ── Template: {{name|params}} ──
        if bytes[i..].starts_with(b"{{") {
            if let Some(end) = find_closing(src, i, b"{{", b"}}") {
                flush_text(src, text_start, i, &mut nodes);
                nodes.push(Node::Template(parse_template(&src[i..end])));
                i = end;
                text_start = i;
                continue;
            }
        }

        // ── Wikilink: [[title|text]] ──
        if bytes[i..].starts_with(b"[[") {
            if let Some(end) = find_closing(src, i, b"[[", b"]]") {
                flush_text(src, text_start, i, &mut nodes);
                nodes.push(Node::Wikilink(parse_wikilink(&src[i + 2..end - 2])));
                i = end;
                text_start = i;
                continue;
            }
        }

        i += 1;
    }

    flush_text(src, text_start, bytes.len(), &mut nodes);
    Wikicode { nodes }
}

fn flush_text(src: &str, start: usize, end: usize, nodes: &mut Vec<Node>) {
    if start < end {
        nodes.push(Node::Text(src[start..end].to_string()));
    }
}

fn parse_heading(line: &str) -> Option<Heading> {
    let caps = HEADING_RE.captures(line)?;
    let (open, close) = (caps[1].len(), caps[3].len());
    let level = open.min(close);
    // Unbalanced markers keep their surplus '=' inside the title.
    let title = format!("{}{}{}", "=".repeat(open - level), &caps[2], "=".repeat(close - level));
    Some(Heading {
        level: level as u8,
        title: parse(&title),
        raw: line.to_string(),
    })
}

/// Byte offset just past the delimiter closing the one at `start`, counting
/// nested pairs of the same kind. `None` when unterminated.
fn find_closing(src: &str, start: usize, open: &[u8], close: &[u8]) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        if bytes[i..].starts_with(open) {
            depth += 1;
            i += open.len();
        } else if bytes[i..].starts_with(close) {
            depth -= 1;
            i += close.len();
            if depth == 0 {
                return Some(i);
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Split on `sep` where it is not nested inside `{{ }}` or `[[ ]]`.
fn split_top_level(s: &str, sep: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let (mut braces, mut brackets) = (0usize, 0usize);
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"{{") {
            braces += 1;
            i += 2;
            continue;
        }
        if bytes[i..].starts_with(b"}}") && braces > 0 {
            braces -= 1;
            i += 2;
            continue;
        }
        if bytes[i..].starts_with(b"[[") {
            brackets += 1;
            i += 2;
            continue;
        }
        if bytes[i..].starts_with(b"]]") && brackets > 0 {
            brackets -= 1;
            i += 2;
            continue;
        }
        if bytes[i] == sep && braces == 0 && brackets == 0 {
            parts.push(&s[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}

fn parse_template(raw: &str) -> Template {
    let inner = &raw[2..raw.len() - 2];
    let mut pieces = split_top_level(inner, b'|').into_iter();
    let name = parse(pieces.next().unwrap_or_default());
    let mut params = Vec::new();
    let mut position = 0;

    for piece in pieces {
        match split_top_level(piece, b'=').as_slice() {
            [key, ..] if piece.len() > key.len() => {
                params.push(Parameter {
                    name: key.trim().to_string(),
                    showkey: true,
                    value: parse(&piece[key.len() + 1..]),
                    raw: piece.to_string(),
                });
            }
            _ => {
                position += 1;
                params.push(Parameter {
                    name: position.to_string(),
                    showkey: false,
                    value: parse(piece),
                    raw: piece.to_string(),
                });
            }
        }
    }

    Template {
        name,
        params,
        raw: raw.to_string(),
    }
}

fn parse_wikilink(inner: &str) -> Wikilink {
    match inner.split_once('|') {
        Some((title, text)) => Wikilink {
            title: title.to_string(),
            text: Some(parse(text)),
        },
        None => Wikilink {
            title: inner.to_string(),
            text: None,
        },
    }
}

impl Wikicode {
    /// Templates directly in this code, not nested ones.
    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Template(t) => Some(t),
            _ => None,
        })
    }

    /// Every template at any depth, parents before their children.
    pub fn templates_recursive(&self) -> Vec<&Template> {
        let mut out = Vec::new();
        self.collect_templates(&mut out);
        out
    }

    fn collect_templates<'a>(&'a self, out: &mut Vec<&'a Template>) {
        for node in &self.nodes {
            match node {
                Node::Template(t) => {
                    out.push(t);
                    t.name.collect_templates(out);
                    for p in &t.params {
                        p.value.collect_templates(out);
                    }
                }
                Node::Heading(h) => h.title.collect_templates(out),
                Node::Wikilink(Wikilink { text: Some(text), .. }) => text.collect_templates(out),
                _ => {}
            }
        }
    }

    pub fn wikilinks(&self) -> impl Iterator<Item = &Wikilink> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Wikilink(l) => Some(l),
            _ => None,
        })
    }

    pub fn headings(&self) -> impl Iterator<Item = &Heading> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Heading(h) => Some(h),
            _ => None,
        })
    }

    /// Visible text: templates dropped, links reduced to their label.
    pub fn strip_code(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Wikilink(l) => out.push_str(&l.label()),
                Node::Heading(h) => out.push_str(&h.title.strip_code()),
                Node::Template(_) => {}
            }
        }
        out
    }
}

impl Template {
    /// Declared name, trimmed.
    pub fn name(&self) -> String {
        self.name.to_string().trim().to_string()
    }

    pub fn positional(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| !p.showkey)
    }

    pub fn named(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| p.showkey)
    }
}

impl Wikilink {
    /// Visible text of the link.
    pub fn label(&self) -> String {
        match &self.text {
            Some(text) => text.strip_code(),
            None => self.title.clone(),
        }
    }
}

impl fmt::Display for Wikicode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(t) => f.write_str(t),
            Node::Template(t) => write!(f, "{}", t),
            Node::Wikilink(l) => write!(f, "{}", l),
            Node::Heading(h) => f.write_str(&h.raw),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl fmt::Display for Wikilink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text {
            Some(text) => write!(f, "[[{}|{}]]", self.title, text),
            None => write!(f, "[[{}]]", self.title),
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_source() {
        let src = "Intro [[Link|text]]\n== Head ==\n{{Name|Fried Egg|1}} tail {{a|{{b|c}}| k = v }}";
        assert_eq!(parse(src).to_string(), src);
    }

    #[test]
    fn template_params() {
        let code = parse("{{Name|Fried Egg|1}}");
        let t = code.templates().next().unwrap();
        assert_eq!(t.name(), "Name");
        assert_eq!(t.params.len(), 2);
        assert_eq!(t.params[0].name, "1");
        assert_eq!(t.params[0].to_string(), "Fried Egg");
        assert_eq!(t.params[1].to_string(), "1");
    }

    #[test]
    fn named_param_keeps_nested_equals() {
        let code = parse("{{Infobox|buff={{Name|Farming|+2}}|note=a=b}}");
        let t = code.templates().next().unwrap();
        let named: Vec<_> = t.named().collect();
        assert_eq!(named[0].name, "buff");
        assert_eq!(named[0].value.to_string(), "{{Name|Farming|+2}}");
        assert_eq!(named[1].name, "note");
        assert_eq!(named[1].value.to_string(), "a=b");
    }

    #[test]
    fn pipes_inside_links_do_not_split() {
        let code = parse("{{T|[[Target|Label]]|x}}");
        let t = code.templates().next().unwrap();
        assert_eq!(t.params.len(), 2);
        assert_eq!(t.params[0].value.wikilinks().next().unwrap().title, "Target");
    }

    #[test]
    fn recursive_templates_in_preorder() {
        let code = parse("{{a|{{b|{{c|1}}}}}}{{d|2}}");
        let names: Vec<_> = code.templates_recursive().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn unterminated_template_is_text() {
        let code = parse("{{broken|x");
        assert_eq!(code.templates().count(), 0);
        assert_eq!(code.to_string(), "{{broken|x");
    }

    #[test]
    fn headings_need_line_start() {
        let code = parse("== Gifting ==\ntext == not == heading\n=== Sub ===");
        let titles: Vec<_> = code
            .headings()
            .map(|h| (h.level, h.title.strip_code().trim().to_string()))
            .collect();
        assert_eq!(titles, vec![(2, "Gifting".to_string()), (3, "Sub".to_string())]);
    }

    #[test]
    fn strip_code_keeps_link_labels() {
        let code = parse("See [[Pierre's General Store|Pierre]]{{Icon}} now");
        assert_eq!(code.strip_code(), "See Pierre now");
    }

    #[test]
    fn templates_inside_link_text() {
        let src = "[[The Mines|{{Name|Mines|x}}]] and [[Pierre]]";
        let code = parse(src);
        let names: Vec<_> = code.templates_recursive().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["Name"]);
        let link = code.wikilinks().next().unwrap();
        assert_eq!(link.title, "The Mines");
        assert_eq!(code.to_string(), src);
    }

    #[test]
    fn template_in_template_name() {
        let code = parse("{{{{1|Infobox cooking}}\n|name = Complete Breakfast\n}}");
        let t = code.templates().next().unwrap();
        assert!(t.name().contains("Infobox"));
        assert_eq!(t.named().next().unwrap().name, "name");
    }
}
