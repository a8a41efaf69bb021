//! Operand dependency graph
//!
//! Undirected graph over labels: two labels are connected iff they co-occur
//! in some operand. Its connected components partition a subscript into
//! independent sub-problems whose results combine by cross product.

use crate::subscript::{Label, LabelSeq};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;

/// Label co-occurrence graph of a subscript
#[derive(Clone, Debug, Default)]
pub struct OperandDependencyGraph {
    adjacency: FxHashMap<Label, FxHashSet<Label>>,
}

impl OperandDependencyGraph {
    /// Build the graph from operand label sequences
    pub fn from_rows(rows: &[LabelSeq]) -> Self {
        let mut adjacency: FxHashMap<Label, FxHashSet<Label>> = FxHashMap::default();
        for row in rows {
            for &label in row {
                adjacency.entry(label).or_default();
            }
            for (i, &a) in row.iter().enumerate() {
                for &b in &row[i + 1..] {
                    if a != b {
                        adjacency.entry(a).or_default().insert(b);
                        adjacency.entry(b).or_default().insert(a);
                    }
                }
            }
        }
        Self { adjacency }
    }

    /// Number of labels in the graph
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    /// Check if the graph has no labels
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// All labels in sorted order
    pub fn labels(&self) -> Vec<Label> {
        let set: BTreeSet<Label> = self.adjacency.keys().copied().collect();
        set.into_iter().collect()
    }

    /// Number of labels the given label co-occurs with
    pub fn degree(&self, label: Label) -> usize {
        self.adjacency.get(&label).map_or(0, |n| n.len())
    }

    /// Labels the given label co-occurs with, in sorted order
    pub fn neighbors(&self, label: Label) -> Vec<Label> {
        let set: BTreeSet<Label> = self
            .adjacency
            .get(&label)
            .map(|n| n.iter().copied().collect())
            .unwrap_or_default();
        set.into_iter().collect()
    }

    /// Connected components, each sorted, ordered by their smallest label
    pub fn components(&self) -> Vec<Vec<Label>> {
        let mut components = Vec::new();
        let mut visited: FxHashSet<Label> = FxHashSet::default();

        for start in self.labels() {
            if visited.contains(&start) {
                continue;
            }
            let mut component = BTreeSet::new();
            let mut queue = vec![start];
            while let Some(label) = queue.pop() {
                if !visited.insert(label) {
                    continue;
                }
                component.insert(label);
                if let Some(neighbors) = self.adjacency.get(&label) {
                    queue.extend(neighbors.iter().copied());
                }
            }
            components.push(component.into_iter().collect());
        }
        components
    }
}
