use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use super::wikicode::{Template, Wikicode};

pub const UNKNOWN_TYPE: &str = "unknown";

/// The summary template of a page, flattened into fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Infobox {
    /// Type word as written, or `"unknown"` for a bare `Infobox`.
    pub entity_type: String,
    /// Template source, as it appears in the page.
    pub raw: String,
    pub fields: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
    Nested(NestedField),
}

/// A field whose value holds templates, keyed by each template's first parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedField {
    pub entries: BTreeMap<String, NestedTemplate>,
    /// Literal text left once the templates are removed.
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NestedTemplate {
    pub name: String,
    pub params: Vec<String>,
}

/// First top-level template whose name mentions `Infobox`.
pub fn find(code: &Wikicode) -> Option<&Template> {
    code.templates()
        .find(|t| t.name.to_string().contains("Infobox"))
}

pub fn extract(page: &str, template: &Template) -> Infobox {
    let fields = template
        .named()
        .map(|p| (p.name.clone(), field_value(page, &p.name, &p.value)))
        .collect();

    Infobox {
        entity_type: entity_type(template),
        raw: template.to_string(),
        fields,
    }
}

/// `{{Infobox villager` → `villager`; `{{{{1|Infobox cooking}}` → `cooking`.
pub fn entity_type(template: &Template) -> String {
    let name = template.name.to_string();
    let first_line = name.lines().next().unwrap_or_default().trim_end();
    if name.trim().ends_with("Infobox") || first_line.ends_with("Infobox") {
        return UNKNOWN_TYPE.to_string();
    }
    let word: String = first_line
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .chars()
        .filter(|c| *c != '}')
        .collect();
    if word.is_empty() {
        UNKNOWN_TYPE.to_string()
    } else {
        word
    }
}

fn field_value(page: &str, field: &str, value: &Wikicode) -> FieldValue {
    let nested = value.templates_recursive();
    if nested.is_empty() {
        return FieldValue::Scalar(value.to_string().trim().to_string());
    }

    let mut out = NestedField::default();
    for template in nested {
        let Some(first) = template.params.first() else {
            debug!(page, field, template = %template, "nested template without parameters");
            continue;
        };
        out.entries.insert(
            first.to_string().trim().to_string(),
            NestedTemplate {
                name: template.name(),
                params: template.params.iter().map(|p| p.to_string()).collect(),
            },
        );
    }

    // Children are removed along with their parent.
    let mut residual = value.to_string();
    for template in value.templates() {
        residual = residual.replacen(&template.to_string(), "", 1);
    }
    let residual = residual.trim();
    if !residual.is_empty() {
        out.data = Some(residual.to_string());
    }

    FieldValue::Nested(out)
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Scalar(s) => Value::from(s.as_str()),
            FieldValue::List(items) => Value::from(items.clone()),
            FieldValue::Nested(nested) => {
                let mut map = Map::new();
                for (key, t) in &nested.entries {
                    map.insert(
                        key.clone(),
                        Value::Array(vec![Value::from(t.name.as_str()), Value::from(t.params.clone())]),
                    );
                }
                if let Some(data) = &nested.data {
                    map.insert("data".into(), Value::from(data.as_str()));
                }
                Value::Object(map)
            }
        }
    }
}

impl Infobox {
    pub fn fields_json(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}
