//! Structured-field providers: page infobox markup → JSON field maps.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::parser::infobox::{self, FieldValue};
use crate::parser::wikicode::{self, Node, Template, Wikicode};

pub type FieldMap = Map<String, Value>;

static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

pub trait FieldProvider {
    /// Field maps keyed by the given page names. `None` means the page has no
    /// usable data and must not be written.
    fn pages_to_fields(&self, pages: &[(String, String)]) -> Result<BTreeMap<String, Option<FieldMap>>>;
}

/// Field maps produced earlier by the conversion service and saved as one
/// JSON object keyed by page name.
pub struct CachedJsonProvider {
    entries: Map<String, Value>,
}

impl CachedJsonProvider {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading field cache {}", path.display()))?;
        let provider = Self::from_json(&text)
            .with_context(|| format!("parsing field cache {}", path.display()))?;
        info!(path = %path.display(), pages = provider.entries.len(), "loaded field cache");
        Ok(provider)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let entries = match serde_json::from_str(text)? {
            Value::Object(map) => map,
            other => anyhow::bail!("expected an object of pages, found {}", kind(&other)),
        };
        Ok(CachedJsonProvider { entries })
    }
}

impl FieldProvider for CachedJsonProvider {
    fn pages_to_fields(&self, pages: &[(String, String)]) -> Result<BTreeMap<String, Option<FieldMap>>> {
        Ok(pages
            .iter()
            .map(|(name, _)| (name.clone(), self.entries.get(name).and_then(decode)))
            .collect())
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Objects are used as they are; strings may hold a (fenced) JSON object.
fn decode(value: &Value) -> Option<FieldMap> {
    match value {
        Value::Object(map) if !map.is_empty() => Some(map.clone()),
        Value::String(s) => match serde_json::from_str(strip_fences(s)) {
            Ok(Value::Object(map)) if !map.is_empty() => Some(map),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "undecodable cached answer");
                None
            }
        },
        _ => None,
    }
}

fn strip_fences(s: &str) -> &str {
    let s = s.trim();
    let s = s.strip_prefix("```json").unwrap_or(s);
    let s = s.strip_prefix("```").unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}

/// Offline provider: renders the infobox fields of the fragment directly.
pub struct InfoboxFlattener;

impl InfoboxFlattener {
    pub fn flatten(fragment: &str) -> Option<FieldMap> {
        let code = wikicode::parse(fragment);
        let template = infobox::find(&code)?;
        let fields: FieldMap = template
            .named()
            .filter_map(|p| {
                let value = render_field(&p.value)?;
                Some((p.name.clone(), value.to_json()))
            })
            .collect();
        (!fields.is_empty()).then_some(fields)
    }
}

impl FieldProvider for InfoboxFlattener {
    fn pages_to_fields(&self, pages: &[(String, String)]) -> Result<BTreeMap<String, Option<FieldMap>>> {
        Ok(pages
            .iter()
            .map(|(name, fragment)| (name.clone(), Self::flatten(fragment)))
            .collect())
    }
}

/// Several templates with nothing between them are a list; otherwise the
/// rendered text, split on `<br>`.
fn render_field(value: &Wikicode) -> Option<FieldValue> {
    let templates: Vec<&Template> = value.templates().collect();
    let only_templates = value.nodes.iter().all(|n| match n {
        Node::Template(_) => true,
        Node::Text(t) => t.trim().is_empty(),
        _ => false,
    });

    if templates.len() > 1 && only_templates {
        let items: Vec<String> = templates
            .iter()
            .map(|t| render_template(t))
            .filter(|s| !s.is_empty())
            .collect();
        return list_or_scalar(items);
    }

    let text = render(value);
    let items: Vec<String> = BR_RE.split(&text).map(clean).filter(|s| !s.is_empty()).collect();
    list_or_scalar(items)
}

fn list_or_scalar(mut items: Vec<String>) -> Option<FieldValue> {
    match items.len() {
        0 => None,
        1 => items.pop().map(FieldValue::Scalar),
        _ => Some(FieldValue::List(items)),
    }
}

fn clean(s: &str) -> String {
    let s = TAG_RE.replace_all(s, "");
    SPACE_RE.replace_all(s.trim(), " ").into_owned()
}

fn render(code: &Wikicode) -> String {
    let mut out = String::new();
    for node in &code.nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Wikilink(l) => match &l.text {
                Some(text) => out.push_str(&render(text)),
                None => out.push_str(&l.title),
            },
            Node::Template(t) => out.push_str(&render_template(t)),
            Node::Heading(h) => out.push_str(&h.title.strip_code()),
        }
    }
    out
}

/// `{{Name|Farming|+2}}` → `"Farming (+2)"`; named parameters are dropped.
fn render_template(t: &Template) -> String {
    let mut args: Vec<String> = t
        .positional()
        .map(|p| clean(&render(&p.value)))
        .filter(|s| !s.is_empty())
        .collect();
    match args.len() {
        0 => String::new(),
        1 => args.remove(0),
        _ => {
            let first = args.remove(0);
            format!("{} ({})", first, args.join(", "))
        }
    }
}
