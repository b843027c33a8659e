//! Dependency tracking between cells
//!
//! Edges are keyed by reference text: plain addresses (`A1`) for the local
//! page and `<raw>:<address>` for external cells. Every listing is sorted and
//! free of duplicates.

use ahash::AHashMap;
use std::collections::BTreeSet;

/// Dependency graph for one sheet evaluation
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Cell → Cells that depend on it (dependents)
    dependents: AHashMap<String, BTreeSet<String>>,
    /// Cell → Cells it depends on (precedents)
    precedents: AHashMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: &str, dependent: &str) {
        self.dependents
            .entry(precedent.to_string())
            .or_default()
            .insert(dependent.to_string());
        self.precedents
            .entry(dependent.to_string())
            .or_default()
            .insert(precedent.to_string());
    }

    /// Record every reference of `dependent` at once
    pub fn add_precedents<'a>(
        &mut self,
        dependent: &str,
        precedents: impl IntoIterator<Item = &'a String>,
    ) {
        for precedent in precedents {
            self.add_dependency(precedent, dependent);
        }
    }

    /// Cells that depend on the given cell, sorted
    pub fn dependents(&self, cell: &str) -> Vec<String> {
        self.dependents
            .get(cell)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Cells the given cell depends on, sorted
    pub fn precedents(&self, cell: &str) -> Vec<String> {
        self.precedents
            .get(cell)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every cell with at least one edge in either direction, sorted
    pub fn cells(&self) -> Vec<String> {
        let cells: BTreeSet<&String> = self
            .dependents
            .keys()
            .chain(self.precedents.keys())
            .collect();
        cells.into_iter().cloned().collect()
    }

    /// Whether the graph has no edges
    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_dependency() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("A1", "B1");
        graph.add_dependency("A1", "B1");
        graph.add_dependency("A1", "A2");

        assert_eq!(graph.dependents("A1"), vec!["A2", "B1"]);
        assert_eq!(graph.precedents("B1"), vec!["A1"]);
        assert!(graph.dependents("B1").is_empty());
    }

    #[test]
    fn test_cells_sorted() {
        let mut graph = DependencyGraph::new();
        assert!(graph.is_empty());
        let refs = vec!["C3".to_string(), "@[X]:A1".to_string()];
        graph.add_precedents("B2", &refs);
        assert_eq!(graph.cells(), vec!["@[X]:A1", "B2", "C3"]);
    }
}
