//! Public hypertrie handle and slicing

use crate::key::SliceKey;
use crate::node::{Edge, Node};
use rdf_model::TermId;
use smallvec::SmallVec;
use std::sync::Arc;

/// A cell coordinate: one term ID per dimension
pub type Cell = SmallVec<[TermId; 3]>;

/// Result of slicing a hypertrie
#[derive(Clone, Debug)]
pub enum SliceResult {
    /// At least one wildcard remained: a trie of depth = number of wildcards
    Trie(BoolHypertrie),
    /// All dimensions were fixed: whether the cell is present
    Scalar(bool),
}

impl SliceResult {
    /// The remaining trie, if any
    pub fn into_trie(self) -> Option<BoolHypertrie> {
        match self {
            SliceResult::Trie(trie) => Some(trie),
            SliceResult::Scalar(_) => None,
        }
    }

    /// Check for the scalar `true` outcome
    pub fn is_scalar_true(&self) -> bool {
        matches!(self, SliceResult::Scalar(true))
    }

    /// Check whether the result holds no cell at all
    pub fn is_vacant(&self) -> bool {
        match self {
            SliceResult::Trie(trie) => trie.is_empty(),
            SliceResult::Scalar(present) => !present,
        }
    }
}

/// A boolean hypertrie of depth >= 1
///
/// Cheap to clone: subtries share nodes by reference. Built once at load
/// time via [`BoolHypertrie::insert`], read-only afterwards.
#[derive(Clone, Debug)]
pub struct BoolHypertrie {
    depth: usize,
    root: Option<Arc<Node>>,
}

impl BoolHypertrie {
    /// Create an empty hypertrie of the given depth
    pub fn new(depth: usize) -> Self {
        debug_assert!(depth >= 1);
        Self { depth, root: None }
    }

    fn from_node(node: Arc<Node>) -> Self {
        Self {
            depth: node.depth(),
            root: Some(node),
        }
    }

    /// Depth (number of dimensions)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of stored cells
    pub fn size(&self) -> u64 {
        self.root.as_ref().map_or(0, |node| node.size())
    }

    /// Check if no cells are stored
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of distinct IDs occurring in `dim`
    pub fn card(&self, dim: usize) -> u64 {
        debug_assert!(dim < self.depth);
        self.root.as_ref().map_or(0, |node| node.card(dim))
    }

    /// Insert a cell; returns `true` if it was newly added
    ///
    /// Only used while loading; the query engine never mutates a trie.
    pub fn insert(&mut self, key: &[TermId]) -> bool {
        debug_assert_eq!(key.len(), self.depth);
        let depth = self.depth;
        let root = self
            .root
            .get_or_insert_with(|| Arc::new(Node::new(depth)));
        Arc::make_mut(root).insert(key)
    }

    /// Check if a fully specified cell is present
    pub fn contains(&self, key: &[TermId]) -> bool {
        let slice_key = SliceKey::new(key.iter().map(|&id| Some(id)));
        self.slice(&slice_key).is_scalar_true()
    }

    /// Slice the trie with `key`, fixing every non-wildcard dimension
    ///
    /// Returns `Scalar(false)` as soon as any fixed lookup misses. With all
    /// dimensions fixed the result is a truth value; otherwise the remaining
    /// trie has one dimension per wildcard, in their original order.
    pub fn slice(&self, key: &SliceKey) -> SliceResult {
        debug_assert_eq!(key.len(), self.depth);
        let wildcards = key.wildcard_count();

        let Some(root) = &self.root else {
            return Self::missed(wildcards);
        };

        let fixed: SmallVec<[(usize, TermId); 3]> = key.fixed().collect();
        if fixed.is_empty() {
            return SliceResult::Trie(self.clone());
        }

        let mut node: &Arc<Node> = root;
        for (i, &(dim, id)) in fixed.iter().enumerate() {
            // Dimensions shift down as earlier fixed dimensions are removed
            let removed_before = fixed[..i].iter().filter(|(d, _)| *d < dim).count();
            match node.edge(dim - removed_before, id) {
                None => return Self::missed(wildcards),
                Some(Edge::Leaf) => return SliceResult::Scalar(true),
                Some(Edge::Sub(child)) => node = child,
            }
        }
        SliceResult::Trie(Self::from_node(Arc::clone(node)))
    }

    /// Slice fixing each dimension in `positions` to the same `id`
    ///
    /// Shorthand used when resolving one label that occurs at several
    /// positions of one operand.
    pub fn slice_positions(&self, positions: &[usize], id: TermId) -> SliceResult {
        self.slice(&SliceKey::fixing(self.depth, positions, id))
    }

    fn missed(wildcards: usize) -> SliceResult {
        if wildcards == 0 {
            SliceResult::Scalar(false)
        } else {
            SliceResult::Trie(BoolHypertrie::new(wildcards))
        }
    }

    /// Sorted streaming iteration over the distinct IDs in `dim`
    pub fn keys(&self, dim: usize) -> KeyIter {
        debug_assert!(dim < self.depth);
        KeyIter {
            node: self.root.clone(),
            dim,
            last: None,
        }
    }

    /// Contract the dimensions in `dims` onto a single joined dimension
    ///
    /// The result has depth `d - |dims| + 1`; the joined dimension sits at
    /// the position of the smallest contracted dimension. A cell is present
    /// iff the original cell had equal IDs across all of `dims`.
    pub fn diagonal(&self, dims: &[usize]) -> BoolHypertrie {
        let mut dims: SmallVec<[usize; 3]> = dims.iter().copied().collect();
        dims.sort_unstable();
        dims.dedup();
        debug_assert!(!dims.is_empty());
        debug_assert!(dims.iter().all(|&d| d < self.depth));

        if dims.len() == 1 {
            return self.clone();
        }

        let joined = dims[0];
        let mut result = BoolHypertrie::new(self.depth - dims.len() + 1);

        // Drive candidates from the tightest contracted dimension
        let driver = dims
            .iter()
            .copied()
            .min_by_key(|&dim| self.card(dim))
            .unwrap_or(joined);

        for id in self.keys(driver) {
            match self.slice(&SliceKey::fixing(self.depth, &dims, id)) {
                SliceResult::Scalar(true) => {
                    result.insert(&[id]);
                }
                SliceResult::Scalar(false) => {}
                SliceResult::Trie(rest) => {
                    for cell in rest.iter() {
                        let mut key = cell;
                        key.insert(joined, id);
                        result.insert(&key);
                    }
                }
            }
        }
        result
    }

    /// Iterate every stored cell in lexicographic dimension-0-first order
    pub fn iter(&self) -> CellIter {
        CellIter {
            frames: self
                .root
                .clone()
                .map(|node| vec![Frame { node, last: None }])
                .unwrap_or_default(),
            prefix: SmallVec::new(),
        }
    }
}

/// Streaming iterator over the distinct IDs of one dimension
///
/// Holds no borrow into the trie: each step re-seeks past the last yielded
/// ID, so the iterator can be stored across recursion levels.
#[derive(Clone, Debug)]
pub struct KeyIter {
    node: Option<Arc<Node>>,
    dim: usize,
    last: Option<TermId>,
}

impl Iterator for KeyIter {
    type Item = TermId;

    fn next(&mut self) -> Option<TermId> {
        let node = self.node.as_ref()?;
        match node.next_key(self.dim, self.last) {
            Some(id) => {
                self.last = Some(id);
                Some(id)
            }
            None => {
                self.node = None;
                None
            }
        }
    }
}

#[derive(Clone, Debug)]
struct Frame {
    node: Arc<Node>,
    last: Option<TermId>,
}

/// Depth-first iterator over all cells of a hypertrie
#[derive(Clone, Debug)]
pub struct CellIter {
    frames: Vec<Frame>,
    prefix: Cell,
}

impl Iterator for CellIter {
    type Item = Cell;

    fn next(&mut self) -> Option<Cell> {
        loop {
            let frame = self.frames.last_mut()?;
            match frame.node.next_key(0, frame.last) {
                None => {
                    self.frames.pop();
                    self.prefix.pop();
                }
                Some(id) => {
                    frame.last = Some(id);
                    if frame.node.depth() == 1 {
                        let mut cell = self.prefix.clone();
                        cell.push(id);
                        return Some(cell);
                    }
                    if let Some(Edge::Sub(child)) = frame.node.edge(0, id) {
                        let child = Arc::clone(child);
                        self.prefix.push(id);
                        self.frames.push(Frame { node: child, last: None });
                    }
                }
            }
        }
    }
}
