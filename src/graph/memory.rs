use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{
    merge_labels, merge_properties, validate_properties, GraphError, GraphStats, GraphStore,
    NodeRef, Properties,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRecord {
    pub labels: Vec<String>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelRecord {
    pub properties: Properties,
    pub created: DateTime<Utc>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// (from, to, type)
pub type RelKey = (String, String, String);

/// Graph state without timestamps, for comparing two runs.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSnapshot {
    pub nodes: BTreeMap<String, NodeRecord>,
    pub relationships: BTreeMap<RelKey, Properties>,
}

/// Ordered in-memory store, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    nodes: BTreeMap<String, NodeRecord>,
    relationships: BTreeMap<RelKey, RelRecord>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, name: &str) -> Option<&NodeRecord> {
        self.nodes.get(name)
    }

    pub fn relationship(&self, from: &str, to: &str, rel_type: &str) -> Option<&RelRecord> {
        self.relationships
            .get(&(from.to_string(), to.to_string(), rel_type.to_string()))
    }

    /// Outgoing edges of `from`, as (to, type, record).
    pub fn relationships_from<'a>(
        &'a self,
        from: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str, &'a RelRecord)> + 'a {
        self.relationships
            .iter()
            .filter(move |((f, _, _), _)| f == from)
            .map(|((_, to, ty), rec)| (to.as_str(), ty.as_str(), rec))
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.clone(),
            relationships: self
                .relationships
                .iter()
                .map(|(k, r)| (k.clone(), r.properties.clone()))
                .collect(),
        }
    }

    fn upsert_node(&mut self, node: &NodeRef) -> &mut NodeRecord {
        let record = self.nodes.entry(node.name.clone()).or_default();
        merge_labels(&mut record.labels, &node.labels);
        record
    }
}

impl GraphStore for MemoryGraph {
    fn merge_node(&mut self, node: &NodeRef, properties: &Properties) -> Result<(), GraphError> {
        validate_properties(&node.name, properties)?;
        let record = self.upsert_node(node);
        merge_properties(&mut record.properties, properties);
        Ok(())
    }

    fn merge_relationship(
        &mut self,
        from: &NodeRef,
        to: &NodeRef,
        rel_type: &str,
        properties: &Properties,
    ) -> Result<(), GraphError> {
        validate_properties(&from.name, &Properties::new())?;
        validate_properties(&to.name, properties)?;
        self.upsert_node(from);
        self.upsert_node(to);

        let now = Utc::now();
        let key = (from.name.clone(), to.name.clone(), rel_type.to_string());
        match self.relationships.get_mut(&key) {
            Some(rec) => {
                rec.last_updated = Some(now);
                merge_properties(&mut rec.properties, properties);
            }
            None => {
                self.relationships.insert(
                    key,
                    RelRecord {
                        properties: properties.clone(),
                        created: now,
                        last_updated: None,
                    },
                );
            }
        }
        Ok(())
    }

    fn stats(&self) -> Result<GraphStats, GraphError> {
        let mut stats = GraphStats {
            nodes: self.nodes.len(),
            relationships: self.relationships.len(),
            ..Default::default()
        };
        for record in self.nodes.values() {
            for label in &record.labels {
                *stats.by_label.entry(label.clone()).or_default() += 1;
            }
        }
        for (_, _, ty) in self.relationships.keys() {
            *stats.by_type.entry(ty.clone()).or_default() += 1;
        }
        Ok(stats)
    }
}
