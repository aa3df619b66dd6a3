//! Field map → graph mutations.
//!
//! Each entity kind owns a static table of field handlers. The common table
//! is composed with the kind's own table when a writer is built, the kind's
//! entries replacing common ones of the same field. Fields without a handler
//! become node properties.

pub mod body;
pub mod calendar;
pub mod entities;
pub mod handlers;
pub mod rules;

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::graph::{validate_value, GraphError, GraphStore, NodeRef, Properties};
pub use entities::EntityKind;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("malformed value: {reason}")]
    Malformed { reason: String },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl WriteError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        WriteError::Malformed {
            reason: reason.into(),
        }
    }
}

/// One entry that could not be written. The rest of the page still was.
#[derive(Debug)]
pub struct WriteFailure {
    pub page: String,
    pub field: String,
    pub entry: String,
    pub error: WriteError,
}

#[derive(Debug, Default)]
pub struct WriteReport {
    pub relationships: usize,
    pub failures: Vec<WriteFailure>,
}

impl WriteReport {
    pub fn record(&mut self, page: &str, field: &str, entry: &str, error: WriteError) {
        warn!(page, field, entry, error = %error, "write failed");
        self.failures.push(WriteFailure {
            page: page.to_string(),
            field: field.to_string(),
            entry: entry.to_string(),
            error,
        });
    }

    pub fn absorb(&mut self, other: WriteReport) {
        self.relationships += other.relationships;
        self.failures.extend(other.failures);
    }
}

pub type Handler = fn(&mut WriteCtx<'_>, &str) -> Result<(), WriteError>;

/// A field name bound to the function that writes one of its entries.
pub struct FieldHandler {
    pub field: &'static str,
    pub handle: Handler,
}

/// The node being written plus the store its edges go to.
pub struct WriteCtx<'a> {
    store: &'a mut dyn GraphStore,
    pub node: NodeRef,
    /// Node properties collected so far; merged once all fields are done.
    pub properties: Properties,
    relationships: usize,
}

impl<'a> WriteCtx<'a> {
    pub fn new(store: &'a mut dyn GraphStore, node: NodeRef) -> Self {
        WriteCtx {
            store,
            node,
            properties: Properties::new(),
            relationships: 0,
        }
    }

    /// `node -[rel_type]-> to`
    pub fn link(&mut self, to: NodeRef, rel_type: &str, props: Properties) -> Result<(), WriteError> {
        self.store
            .merge_relationship(&self.node, &to, rel_type, &props)?;
        self.relationships += 1;
        Ok(())
    }

    /// `from -[rel_type]-> node`
    pub fn link_from(
        &mut self,
        from: NodeRef,
        rel_type: &str,
        props: Properties,
    ) -> Result<(), WriteError> {
        self.store
            .merge_relationship(&from, &self.node, rel_type, &props)?;
        self.relationships += 1;
        Ok(())
    }

    pub fn relationships(&self) -> usize {
        self.relationships
    }
}

/// Property map from key/value pairs.
pub fn props<const N: usize>(pairs: [(&str, Value); N]) -> Properties {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// `{"data": aux}` when there is an auxiliary text, `{}` otherwise.
pub fn data_props(aux: Option<&str>) -> Properties {
    match aux {
        Some(a) => props([("data", Value::from(a))]),
        None => Properties::new(),
    }
}

/// Writes one page's field map as a node of a given kind.
pub struct InfoboxWriter<'f> {
    kind: EntityKind,
    name: String,
    labels: Vec<String>,
    fields: &'f Map<String, Value>,
    handlers: BTreeMap<&'static str, Handler>,
}

impl<'f> InfoboxWriter<'f> {
    pub fn new(kind: EntityKind, name: &str, fields: &'f Map<String, Value>) -> Self {
        let handlers = handlers::COMMON
            .iter()
            .chain(kind.specific_handlers())
            .map(|h| (h.field, h.handle))
            .collect();
        InfoboxWriter {
            kind,
            name: name.to_string(),
            labels: vec![kind.default_label().to_string()],
            fields,
            handlers,
        }
    }

    /// Replace the default label.
    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn handler(&self, field: &str) -> Option<Handler> {
        self.handlers.get(field).copied()
    }

    pub fn write(&self, store: &mut dyn GraphStore) -> WriteReport {
        let node = NodeRef::new(&self.name).labels(self.labels.iter().map(String::as_str));
        debug!(page = %node.name, labels = ?node.labels, "writing infobox");

        let mut report = WriteReport::default();
        let mut ctx = WriteCtx::new(store, node);

        for (key, value) in self.fields {
            let Some(handle) = self.handler(key) else {
                // Absent and null are the same to the store.
                if value.is_null() {
                    continue;
                }
                match validate_value(&self.name, key, value) {
                    Ok(()) => {
                        ctx.properties.insert(key.clone(), value.clone());
                    }
                    Err(e) => report.record(&self.name, key, &value.to_string(), e.into()),
                }
                continue;
            };

            let entries = match entries(value) {
                Ok(entries) => entries,
                Err(e) => {
                    report.record(&self.name, key, &value.to_string(), e);
                    continue;
                }
            };
            for entry in entries.iter().filter(|e| !is_placeholder(e)) {
                if let Err(e) = handle(&mut ctx, entry) {
                    report.record(&self.name, key, entry, e);
                }
            }
        }

        self.post_process(&mut ctx.properties);

        if let Err(e) = ctx.store.merge_node(&ctx.node, &ctx.properties) {
            report.record(&self.name, "", "", e.into());
        }
        report.relationships += ctx.relationships();
        report
    }

    pub fn post_process(&self, properties: &mut Properties) {
        self.kind.post_process(properties);
    }
}

/// Wrap scalars; lists must hold scalars only.
fn entries(value: &Value) -> Result<Vec<String>, WriteError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Number(n) => Ok(vec![n.to_string()]),
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(WriteError::malformed(format!("list entry {}", other))),
            })
            .collect(),
        Value::Bool(_) => Err(WriteError::malformed("boolean where text was expected")),
        Value::Object(_) => Err(WriteError::malformed("map where text was expected")),
    }
}

fn is_placeholder(entry: &str) -> bool {
    entry == "N/A" || entry.eq_ignore_ascii_case("none")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;
    use serde_json::json;

    fn fields(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn villager_end_to_end() {
        let f = fields(json!({
            "address": "Carpenter's Shop (24 Mountain Road)",
            "birthday": "(Spring 1)",
            "family": "Maru (Sister)",
            "marriage": "Yes",
        }));
        let mut g = MemoryGraph::new();
        let report = InfoboxWriter::new(EntityKind::Villager, "Sebastian", &f).write(&mut g);
        assert!(report.failures.is_empty());
        assert_eq!(report.relationships, 3);

        assert!(g.relationship("Sebastian", "Carpenter's Shop", "LIVES_IN").is_some());
        assert!(g.relationship("Sebastian", "Spring 1", "BIRTHDAY").is_some());
        let family = g.relationship("Sebastian", "Maru", "HAS_FAMILY_MEMBER").unwrap();
        assert_eq!(family.properties["type"], "Sister");
        assert_eq!(g.relationships_from("Sebastian").count(), 3);

        let node = g.node("Sebastian").unwrap();
        assert_eq!(node.labels, vec!["Villager"]);
        assert_eq!(node.properties["marriage"], "Yes");
        assert!(!node.properties.contains_key("address"));
        assert!(g.node("Carpenter's Shop").unwrap().labels.contains(&"Location".to_string()));
    }

    #[test]
    fn specific_handler_overrides_common() {
        let f = Map::new();
        let weapon = InfoboxWriter::new(EntityKind::Weapon, "Galaxy Sword", &f);
        let generic = InfoboxWriter::new(EntityKind::Generic, "Galaxy Sword", &f);
        let w = weapon.handler("source").unwrap() as usize;
        let g = generic.handler("source").unwrap() as usize;
        assert_ne!(w, g);
        assert_eq!(
            weapon.handler("location").unwrap() as usize,
            generic.handler("location").unwrap() as usize
        );
        assert!(generic.handler("address").is_none());
    }

    #[test]
    fn placeholders_are_skipped() {
        let f = fields(json!({"ingredients": ["N/A", "None", "NONE", "Egg (2)"]}));
        let mut g = MemoryGraph::new();
        let report = InfoboxWriter::new(EntityKind::Generic, "Fried Egg", &f).write(&mut g);
        assert_eq!(report.relationships, 1);
        assert_eq!(g.relationship("Fried Egg", "Egg", "REQUIRES").unwrap().properties["quantity"], 2);
    }

    #[test]
    fn malformed_field_does_not_stop_the_page() {
        let f = fields(json!({
            "ingredients": {"Egg": ["Name", ["Egg", "1"]]},
            "source": ["Crafting", {"bad": 1}],
            "season": "Spring",
            "sellprice": 35,
        }));
        let mut g = MemoryGraph::new();
        let report = InfoboxWriter::new(EntityKind::Generic, "Fried Egg", &f).write(&mut g);

        let fields: Vec<_> = report.failures.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["ingredients", "source"]);
        assert!(g.relationship("Fried Egg", "Spring", "AVAILABLE_IN").is_some());
        assert_eq!(g.node("Fried Egg").unwrap().properties["sellprice"], 35);
    }

    #[test]
    fn unstorable_property_is_dropped_alone() {
        let f = fields(json!({"sellprice": 50, "edibility": 10, "extra": {"a": 1}, "mixed": [1, "a"]}));
        let mut g = MemoryGraph::new();
        let report = InfoboxWriter::new(EntityKind::Generic, "Stone", &f).write(&mut g);

        let failed: Vec<_> = report.failures.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(failed, vec!["extra", "mixed"]);
        assert!(report.failures.iter().all(|f| matches!(
            f.error,
            WriteError::Graph(GraphError::InvalidProperty { .. })
        )));

        let node = g.node("Stone").unwrap();
        assert_eq!(node.labels, vec!["Item"]);
        assert_eq!(node.properties["sellprice"], 50);
        assert_eq!(node.properties["edibility"], 10);
        assert!(!node.properties.contains_key("extra"));
    }

    #[test]
    fn bad_property_keeps_edges_and_node() {
        let f = fields(json!({"stats": "Speed (+1)", "extra": {"a": 1}}));
        let mut g = MemoryGraph::new();
        let report = InfoboxWriter::new(EntityKind::Generic, "Coffee", &f).write(&mut g);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].field, "extra");
        assert!(g.relationship("Coffee", "Speed", "BUFF").is_some());
        assert!(g.node("Coffee").is_some());
    }

    #[test]
    fn custom_labels() {
        let f = fields(json!({"sellprice": "50"}));
        let mut g = MemoryGraph::new();
        InfoboxWriter::new(EntityKind::Generic, "hay", &f)
            .with_labels(&["AnimalProducts"])
            .write(&mut g);
        assert_eq!(g.node("Hay").unwrap().labels, vec!["AnimalProducts"]);
    }

    #[test]
    fn rewrite_is_idempotent() {
        let f = fields(json!({
            "family": ["Robin (Mother)", "Maru (Half-Sister)"],
            "friends": "Sam",
            "birthday": "(Winter 10)",
            "address": "24 Mountain Road",
        }));
        let mut g = MemoryGraph::new();
        InfoboxWriter::new(EntityKind::Villager, "Sebastian", &f).write(&mut g);
        let first = g.snapshot();
        InfoboxWriter::new(EntityKind::Villager, "Sebastian", &f).write(&mut g);
        assert_eq!(g.snapshot(), first);
    }
}
