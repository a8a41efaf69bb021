//! Internal hypertrie node representation

use rdf_model::TermId;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// Edge target: a leaf for depth-1 nodes, a subtrie otherwise
#[derive(Clone, Debug)]
pub(crate) enum Edge {
    /// Terminal edge of a depth-1 node
    Leaf,
    /// Child of depth `parent.depth - 1`
    Sub(Arc<Node>),
}

/// A hypertrie node of depth >= 1
///
/// Keeps one sorted edge map per dimension. `edges[i]` maps every ID that
/// occurs in dimension `i` to the subtrie obtained by fixing dimension `i`
/// to that ID. Only non-empty children are stored.
#[derive(Clone, Debug)]
pub(crate) struct Node {
    depth: usize,
    size: u64,
    edges: SmallVec<[BTreeMap<TermId, Edge>; 3]>,
}

impl Node {
    pub(crate) fn new(depth: usize) -> Self {
        debug_assert!(depth >= 1);
        Self {
            depth,
            size: 0,
            edges: (0..depth).map(|_| BTreeMap::new()).collect(),
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    /// Distinct IDs occurring in `dim`
    pub(crate) fn card(&self, dim: usize) -> u64 {
        self.edges[dim].len() as u64
    }

    pub(crate) fn edge(&self, dim: usize, id: TermId) -> Option<&Edge> {
        self.edges[dim].get(&id)
    }

    /// Smallest key in `dim` strictly greater than `after` (or the smallest
    /// key overall when `after` is `None`)
    ///
    /// Stateless cursor primitive: iteration holds no borrow into the node.
    pub(crate) fn next_key(&self, dim: usize, after: Option<TermId>) -> Option<TermId> {
        let lower = match after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        self.edges[dim]
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(&id, _)| id)
    }

    /// Insert a cell; returns `true` if the cell was not present before
    ///
    /// Every dimension's edge map is updated so that any slicing order stays
    /// available.
    pub(crate) fn insert(&mut self, key: &[TermId]) -> bool {
        debug_assert_eq!(key.len(), self.depth);

        let newly_added = if self.depth == 1 {
            self.edges[0].insert(key[0], Edge::Leaf).is_none()
        } else {
            let mut newly_added = false;
            for dim in 0..self.depth {
                let subkey: SmallVec<[TermId; 3]> = key
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != dim)
                    .map(|(_, &id)| id)
                    .collect();

                let edge = self.edges[dim]
                    .entry(key[dim])
                    .or_insert_with(|| Edge::Sub(Arc::new(Node::new(self.depth - 1))));
                if let Edge::Sub(child) = edge {
                    let child_added = Arc::make_mut(child).insert(&subkey);
                    // The same cell is added along every dimension; count once
                    if dim == 0 {
                        newly_added = child_added;
                    }
                }
            }
            newly_added
        };

        if newly_added {
            self.size += 1;
        }
        newly_added
    }
}
