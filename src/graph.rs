//! Dependency graph between tables
//!
//! An edge `a -> b` means table `a` has a foreign key referencing `b`, so `b`
//! must be created and populated before `a`, and dropped after it. Only
//! direct references are stored; transitive order is derived by traversal.

use crate::introspection::{SequenceDescriptor, SequenceOwner, TableDescriptor};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Table names in first-seen order
    nodes: Vec<String>,
    /// Table -> tables it references, deduplicated, first-seen order
    edges: HashMap<String, Vec<String>>,
    /// Sequence -> owning table column
    sequence_owners: Vec<(String, SequenceOwner)>,
}

impl DependencyGraph {
    /// Build the graph from each table's outbound foreign keys
    pub fn from_tables(tables: &[TableDescriptor]) -> Self {
        let mut graph = Self::default();

        for table in tables {
            graph.add_node(&table.name);
        }

        for table in tables {
            for fk in &table.foreign_keys {
                graph.add_edge(&table.name, &fk.referenced_table);
            }
        }

        graph
    }

    /// Build the graph from plain `(table, referenced_table)` pairs
    #[cfg(test)]
    pub fn from_edges<S: AsRef<str>>(nodes: &[S], edges: &[(S, S)]) -> Self {
        let mut graph = Self::default();

        for node in nodes {
            graph.add_node(node.as_ref());
        }

        for (from, to) in edges {
            graph.add_edge(from.as_ref(), to.as_ref());
        }

        graph
    }

    /// Attach sequence ownership edges
    pub fn with_sequences(mut self, sequences: &[SequenceDescriptor]) -> Self {
        self.sequence_owners = sequences
            .iter()
            .filter_map(|s| s.owner.clone().map(|owner| (s.name.clone(), owner)))
            .collect();
        self
    }

    fn add_node(&mut self, name: &str) {
        if !self.edges.contains_key(name) {
            self.nodes.push(name.to_string());
            self.edges.insert(name.to_string(), Vec::new());
        }
    }

    fn add_edge(&mut self, from: &str, to: &str) {
        self.add_node(from);
        let deps = self.edges.entry(from.to_string()).or_default();
        if !deps.iter().any(|d| d == to) {
            deps.push(to.to_string());
        }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// Tables directly referenced by `table`
    pub fn dependencies(&self, table: &str) -> &[String] {
        self.edges.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sequences owned by a column of `table`, in catalog order
    pub fn sequences_owned_by<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a SequenceOwner)> + 'a {
        self.sequence_owners
            .iter()
            .filter(move |(_, owner)| owner.table == table)
            .map(|(name, owner)| (name.as_str(), owner))
    }
}
