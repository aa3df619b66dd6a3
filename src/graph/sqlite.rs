use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use super::{
    merge_labels, merge_properties, validate_properties, GraphError, GraphStats, GraphStore,
    NodeRef, Properties,
};

/// Graph persisted in SQLite. Labels and properties are JSON text columns.
pub struct SqliteGraph {
    conn: Connection,
}

impl SqliteGraph {
    pub fn open(path: &Path) -> Result<Self, GraphError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, GraphError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, GraphError> {
        init_schema(&conn)?;
        Ok(SqliteGraph { conn })
    }

    /// Drop every node and relationship.
    pub fn clear(&mut self) -> Result<(), GraphError> {
        self.conn
            .execute_batch("DELETE FROM relationships; DELETE FROM nodes;")?;
        Ok(())
    }

    pub fn node(&self, name: &str) -> Result<Option<(Vec<String>, Properties)>, GraphError> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT labels, properties FROM nodes WHERE name = ?1",
                [name],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        match row {
            Some((labels, props)) => Ok(Some((
                serde_json::from_str(&labels)?,
                serde_json::from_str(&props)?,
            ))),
            None => Ok(None),
        }
    }

    pub fn relationship(
        &self,
        from: &str,
        to: &str,
        rel_type: &str,
    ) -> Result<Option<Properties>, GraphError> {
        let props: Option<String> = self
            .conn
            .query_row(
                "SELECT properties FROM relationships
                 WHERE from_name = ?1 AND to_name = ?2 AND rel_type = ?3",
                [from, to, rel_type],
                |r| r.get(0),
            )
            .optional()?;
        props
            .map(|p| serde_json::from_str(&p))
            .transpose()
            .map_err(GraphError::from)
    }
}

fn init_schema(conn: &Connection) -> Result<(), GraphError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS nodes (
            name        TEXT PRIMARY KEY,
            labels      TEXT NOT NULL DEFAULT '[]',
            properties  TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS relationships (
            id            INTEGER PRIMARY KEY,
            from_name     TEXT NOT NULL REFERENCES nodes(name),
            to_name       TEXT NOT NULL REFERENCES nodes(name),
            rel_type      TEXT NOT NULL,
            properties    TEXT NOT NULL DEFAULT '{}',
            created       TEXT NOT NULL,
            last_updated  TEXT,
            UNIQUE(from_name, to_name, rel_type)
        );
        CREATE INDEX IF NOT EXISTS idx_rel_from ON relationships(from_name);
        CREATE INDEX IF NOT EXISTS idx_rel_to ON relationships(to_name);
        CREATE INDEX IF NOT EXISTS idx_rel_type ON relationships(rel_type);
        ",
    )?;
    Ok(())
}

/// Read-merge-write one node inside the caller's transaction.
fn upsert_node(
    conn: &Connection,
    node: &NodeRef,
    properties: &Properties,
) -> Result<(), GraphError> {
    let existing: Option<(String, String)> = conn
        .query_row(
            "SELECT labels, properties FROM nodes WHERE name = ?1",
            [&node.name],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    let (mut labels, mut props): (Vec<String>, Properties) = match existing {
        Some((l, p)) => (serde_json::from_str(&l)?, serde_json::from_str(&p)?),
        None => Default::default(),
    };
    merge_labels(&mut labels, &node.labels);
    merge_properties(&mut props, properties);

    conn.execute(
        "INSERT INTO nodes (name, labels, properties) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO UPDATE SET labels = excluded.labels, properties = excluded.properties",
        rusqlite::params![node.name, serde_json::to_string(&labels)?, serde_json::to_string(&props)?],
    )?;
    Ok(())
}

impl GraphStore for SqliteGraph {
    fn merge_node(&mut self, node: &NodeRef, properties: &Properties) -> Result<(), GraphError> {
        validate_properties(&node.name, properties)?;
        let tx = self.conn.unchecked_transaction()?;
        upsert_node(&tx, node, properties)?;
        tx.commit()?;
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

        let tx = self.conn.unchecked_transaction()?;
        upsert_node(&tx, from, &Properties::new())?;
        upsert_node(&tx, to, &Properties::new())?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT properties FROM relationships
                 WHERE from_name = ?1 AND to_name = ?2 AND rel_type = ?3",
                rusqlite::params![from.name, to.name, rel_type],
                |r| r.get(0),
            )
            .optional()?;

        let now = Utc::now().to_rfc3339();
        match existing {
            Some(p) => {
                let mut props: Properties = serde_json::from_str(&p)?;
                merge_properties(&mut props, properties);
                tx.execute(
                    "UPDATE relationships SET properties = ?1, last_updated = ?2
                     WHERE from_name = ?3 AND to_name = ?4 AND rel_type = ?5",
                    rusqlite::params![
                        serde_json::to_string(&props)?,
                        now,
                        from.name,
                        to.name,
                        rel_type
                    ],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO relationships (from_name, to_name, rel_type, properties, created)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        from.name,
                        to.name,
                        rel_type,
                        serde_json::to_string(properties)?,
                        now
                    ],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn stats(&self) -> Result<GraphStats, GraphError> {
        let nodes: usize = self.conn.query_row("SELECT COUNT(*) FROM nodes", [], |r| r.get(0))?;
        let relationships: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM relationships", [], |r| r.get(0))?;

        let mut stats = GraphStats {
            nodes,
            relationships,
            ..Default::default()
        };

        let mut stmt = self.conn.prepare("SELECT labels FROM nodes")?;
        let rows = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for labels in rows {
            let labels: Vec<String> = serde_json::from_str(&labels)?;
            for label in labels {
                *stats.by_label.entry(label).or_default() += 1;
            }
        }

        let mut stmt = self
            .conn
            .prepare("SELECT rel_type, COUNT(*) FROM relationships GROUP BY rel_type")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, usize>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        stats.by_type.extend(rows);

        Ok(stats)
    }
}
