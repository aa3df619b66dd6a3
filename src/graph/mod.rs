//! Idempotent property-graph mutations.
//!
//! A node is keyed by its name alone; a relationship by the ordered triple
//! (from, to, type). Merging the same thing twice converges instead of
//! duplicating: labels accumulate, properties are shallow-merged.

pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::util::format_page_name;

pub use memory::MemoryGraph;
pub use sqlite::SqliteGraph;

pub type Properties = Map<String, Value>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node name is empty")]
    EmptyName,
    #[error("property {key:?} of {owner} cannot be stored: {reason}")]
    InvalidProperty {
        owner: String,
        key: String,
        reason: &'static str,
    },
    #[error("storage: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A node endpoint: canonical name plus the labels to apply on merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub name: String,
    pub labels: Vec<String>,
}

impl NodeRef {
    pub fn new(name: &str) -> Self {
        NodeRef {
            name: format_page_name(name),
            labels: Vec::new(),
        }
    }

    pub fn label(mut self, label: &str) -> Self {
        if !self.labels.iter().any(|l| l == label) {
            self.labels.push(label.to_string());
        }
        self
    }

    pub fn labels<'a>(self, labels: impl IntoIterator<Item = &'a str>) -> Self {
        labels.into_iter().fold(self, NodeRef::label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub relationships: usize,
    pub by_label: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
}

pub trait GraphStore {
    /// Find-or-create `node`, add its labels, shallow-merge `properties`.
    fn merge_node(&mut self, node: &NodeRef, properties: &Properties) -> Result<(), GraphError>;

    /// Find-or-create both endpoints and one `rel_type` edge between them,
    /// then shallow-merge `properties` into the edge.
    fn merge_relationship(
        &mut self,
        from: &NodeRef,
        to: &NodeRef,
        rel_type: &str,
        properties: &Properties,
    ) -> Result<(), GraphError>;

    fn stats(&self) -> Result<GraphStats, GraphError>;
}

/// Checks the values a store accepts: scalars, or arrays of one scalar kind.
pub fn validate_properties(owner: &str, properties: &Properties) -> Result<(), GraphError> {
    if owner.trim().is_empty() {
        return Err(GraphError::EmptyName);
    }
    for (key, value) in properties {
        validate_value(owner, key, value)?;
    }
    Ok(())
}

/// One property value, checked the way `validate_properties` checks a map.
pub fn validate_value(owner: &str, key: &str, value: &Value) -> Result<(), GraphError> {
    let reason = match value {
        Value::Null => Some("null value"),
        Value::Object(_) => Some("map value"),
        Value::Array(items) => check_array(items),
        _ => None,
    };
    match reason {
        Some(reason) => Err(GraphError::InvalidProperty {
            owner: owner.to_string(),
            key: key.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn check_array(items: &[Value]) -> Option<&'static str> {
    let kind = |v: &Value| match v {
        Value::String(_) => Some(0),
        Value::Number(_) => Some(1),
        Value::Bool(_) => Some(2),
        _ => None,
    };
    let mut first = None;
    for item in items {
        let Some(k) = kind(item) else {
            return Some("list holds a non-scalar");
        };
        match first {
            None => first = Some(k),
            Some(f) if f != k => return Some("list mixes types"),
            _ => {}
        }
    }
    None
}

pub(crate) fn merge_labels(existing: &mut Vec<String>, labels: &[String]) {
    for label in labels {
        if !existing.contains(label) {
            existing.push(label.clone());
        }
    }
}

pub(crate) fn merge_properties(existing: &mut Properties, properties: &Properties) {
    for (k, v) in properties {
        existing.insert(k.clone(), v.clone());
    }
}
