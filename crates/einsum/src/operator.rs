//! The streaming einsum operator
//!
//! Produces `(binding, count)` pairs lazily from a subscript and its
//! operands. Evaluation keeps an explicit stack of frames, one per resolved
//! label: a frame enumerates the candidate IDs of its label from the
//! tightest bearing dimension, probes every other bearing operand by
//! slicing, and either descends into the residual problem or emits.
//!
//! Labels that occur once and are not projected are never enumerated:
//! once an operand's remaining labels are all of that kind, the operand
//! contributes its cell count as a multiplicative factor (or 1 under
//! distinct semantics).
//!
//! When the dependency graph splits, each component evaluates on its own
//! operands; the first projecting component streams while the others are
//! materialized once, and their results combine as a cross product.

use crate::cardinality::choose_label;
use crate::subscript::{Label, LabelSeq, Modifier, Subscript};
use crate::timeout::{Deadline, DeadlineExceeded, TimeoutProbe};
use ahash::AHashSet;
use hypertrie::{BoolHypertrie, KeyIter, SliceResult};
use rdf_model::TermId;
use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;
use tracing::trace;

/// One result tuple: a value (or unbound slot) per projection position
pub type ResultKey = SmallVec<[Option<TermId>; 4]>;

/// A binding with its multiplicity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// One entry per projection slot; `None` marks an unbound slot
    pub key: ResultKey,
    /// Multiplicity (always 1 under distinct semantics)
    pub count: u64,
}

/// Errors raised while evaluating
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The deadline passed while the join was still running
    #[error("processing deadline exceeded during evaluation")]
    ProcessingTimeout,
}

impl From<DeadlineExceeded> for EvalError {
    fn from(_: DeadlineExceeded) -> Self {
        EvalError::ProcessingTimeout
    }
}

/// Projection slot positions per label
type Slots = FxHashMap<Label, SmallVec<[usize; 2]>>;

struct Frame {
    operands: Vec<BoolHypertrie>,
    rows: Vec<LabelSeq>,
    label: Label,
    /// Operand indices bearing the label, with the label's positions there
    bearers: SmallVec<[(usize, SmallVec<[usize; 2]>); 4]>,
    keys: KeyIter,
    count: u64,
}

enum Plan {
    /// No enumerable label remains; emit with this total count
    Emit(u64),
    Descend(Frame),
}

/// Decide how to continue on a residual problem
///
/// Enumerable labels are those that are projected or occur in at least two
/// operand slots. Without any, every remaining operand carries only lonely
/// unprojected labels and its cell count becomes a multiplicative factor.
fn plan(
    slots: &Slots,
    modifier: Modifier,
    operands: Vec<BoolHypertrie>,
    rows: Vec<LabelSeq>,
    count: u64,
) -> Plan {
    let mut occurrences: FxHashMap<Label, usize> = FxHashMap::default();
    for row in &rows {
        for &label in row {
            *occurrences.entry(label).or_insert(0) += 1;
        }
    }
    let mut candidates: Vec<Label> = occurrences
        .iter()
        .filter(|&(label, &uses)| uses >= 2 || slots.contains_key(label))
        .map(|(&label, _)| label)
        .collect();
    candidates.sort_unstable();

    if candidates.is_empty() {
        if operands.iter().any(BoolHypertrie::is_empty) {
            return Plan::Emit(0);
        }
        let factor: u64 = match modifier {
            Modifier::Counted => operands
                .iter()
                .map(BoolHypertrie::size)
                .fold(1, u64::saturating_mul),
            Modifier::Distinct => 1,
        };
        return Plan::Emit(count.saturating_mul(factor));
    }

    let Some(est) = choose_label(&rows, &operands, &candidates) else {
        return Plan::Emit(0);
    };
    trace!(label = %est.label, estimate = est.estimate, "resolving label");

    let bearers = rows
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| {
            let positions: SmallVec<[usize; 2]> = row
                .iter()
                .enumerate()
                .filter(|(_, &label)| label == est.label)
                .map(|(pos, _)| pos)
                .collect();
            (!positions.is_empty()).then_some((idx, positions))
        })
        .collect();
    let keys = operands[est.operand].keys(est.dim);

    Plan::Descend(Frame {
        operands,
        rows,
        label: est.label,
        bearers,
        keys,
        count,
    })
}

/// Streaming evaluator for a single dependency-graph component
struct Evaluator {
    modifier: Modifier,
    slots: Arc<Slots>,
    tuple: ResultKey,
    stack: Vec<Frame>,
    pending: Option<Entry>,
    /// Emitted tuples, kept only under distinct semantics
    seen: Option<AHashSet<ResultKey>>,
    done: bool,
}

impl Evaluator {
    fn new(
        rows: Vec<LabelSeq>,
        operands: Vec<BoolHypertrie>,
        slots: Arc<Slots>,
        width: usize,
        modifier: Modifier,
    ) -> Self {
        debug_assert_eq!(rows.len(), operands.len());
        let mut evaluator = Self {
            modifier,
            slots,
            tuple: smallvec![None; width],
            stack: Vec::new(),
            pending: None,
            seen: (modifier == Modifier::Distinct).then(AHashSet::new),
            done: false,
        };
        match plan(&evaluator.slots, modifier, operands, rows, 1) {
            Plan::Emit(total) => {
                if total > 0 {
                    let count = match modifier {
                        Modifier::Counted => total,
                        Modifier::Distinct => 1,
                    };
                    evaluator.pending = Some(Entry {
                        key: evaluator.tuple.clone(),
                        count,
                    });
                }
            }
            Plan::Descend(frame) => evaluator.stack.push(frame),
        }
        evaluator
    }

    /// An evaluator producing exactly one empty binding with count 1
    fn unit(width: usize, modifier: Modifier) -> Self {
        Self {
            modifier,
            slots: Arc::new(Slots::default()),
            tuple: smallvec![None; width],
            stack: Vec::new(),
            pending: Some(Entry {
                key: smallvec![None; width],
                count: 1,
            }),
            seen: None,
            done: false,
        }
    }

    fn next(&mut self, probe: &mut TimeoutProbe) -> Result<Option<Entry>, EvalError> {
        if self.done {
            return Ok(None);
        }
        if let Some(entry) = self.pending.take() {
            return Ok(Some(entry));
        }
        loop {
            let Some(frame) = self.stack.last_mut() else {
                self.done = true;
                return Ok(None);
            };
            probe.tick()?;

            let Some(id) = frame.keys.next() else {
                // Label exhausted: unbind its slots and backtrack
                let label = frame.label;
                self.stack.pop();
                if let Some(positions) = self.slots.get(&label) {
                    for &slot in positions {
                        self.tuple[slot] = None;
                    }
                }
                continue;
            };

            // Probe every operand bearing the label; any miss kills this ID
            let mut next_operands = Vec::with_capacity(frame.operands.len());
            let mut next_rows = Vec::with_capacity(frame.rows.len());
            let mut dead = false;
            for (idx, operand) in frame.operands.iter().enumerate() {
                let row = &frame.rows[idx];
                let positions = frame
                    .bearers
                    .iter()
                    .find(|(bearer, _)| *bearer == idx)
                    .map(|(_, positions)| positions.as_slice());
                let Some(positions) = positions else {
                    next_operands.push(operand.clone());
                    next_rows.push(row.clone());
                    continue;
                };
                match operand.slice_positions(positions, id) {
                    SliceResult::Scalar(true) => {}
                    SliceResult::Scalar(false) => {
                        dead = true;
                        break;
                    }
                    SliceResult::Trie(trie) => {
                        if trie.is_empty() {
                            dead = true;
                            break;
                        }
                        next_rows.push(
                            row.iter().copied().filter(|&l| l != frame.label).collect(),
                        );
                        next_operands.push(trie);
                    }
                }
            }
            if dead {
                continue;
            }

            let label = frame.label;
            let count = frame.count;
            if let Some(positions) = self.slots.get(&label) {
                for &slot in positions {
                    self.tuple[slot] = Some(id);
                }
            }

            match plan(&self.slots, self.modifier, next_operands, next_rows, count) {
                Plan::Emit(total) => {
                    if total == 0 {
                        continue;
                    }
                    let key = self.tuple.clone();
                    match self.modifier {
                        Modifier::Counted => return Ok(Some(Entry { key, count: total })),
                        Modifier::Distinct => {
                            if let Some(seen) = &mut self.seen {
                                if !seen.insert(key.clone()) {
                                    continue;
                                }
                            }
                            return Ok(Some(Entry { key, count: 1 }));
                        }
                    }
                }
                Plan::Descend(new_frame) => {
                    probe.check_now()?;
                    self.stack.push(new_frame);
                }
            }
        }
    }
}

/// Cross product over independent components
///
/// The first projecting component streams; every other component is drained
/// once up front. Components without projection slots collapse into a
/// scalar count multiplier.
struct CrossProduct {
    first: Evaluator,
    others: Vec<(Evaluator, bool)>,
    rest: Vec<Vec<Entry>>,
    scalar: u64,
    current: Option<Entry>,
    indices: SmallVec<[usize; 4]>,
    modifier: Modifier,
    ready: bool,
    empty: bool,
}

impl CrossProduct {
    fn new(first: Evaluator, others: Vec<(Evaluator, bool)>, modifier: Modifier) -> Self {
        Self {
            first,
            others,
            rest: Vec::new(),
            scalar: 1,
            current: None,
            indices: SmallVec::new(),
            modifier,
            ready: false,
            empty: false,
        }
    }

    fn materialize(&mut self, probe: &mut TimeoutProbe) -> Result<(), EvalError> {
        for (mut evaluator, has_slots) in std::mem::take(&mut self.others) {
            let mut entries: Vec<Entry> = Vec::new();
            let mut total: u64 = 0;
            while let Some(entry) = evaluator.next(probe)? {
                total = total.saturating_add(entry.count);
                if has_slots {
                    entries.push(entry);
                }
            }
            if has_slots {
                if entries.is_empty() {
                    self.empty = true;
                    return Ok(());
                }
                self.rest.push(entries);
            } else {
                if total == 0 {
                    self.empty = true;
                    return Ok(());
                }
                self.scalar = self.scalar.saturating_mul(total);
            }
        }
        Ok(())
    }

    fn advance(indices: &mut [usize], rest: &[Vec<Entry>]) -> bool {
        for pos in (0..indices.len()).rev() {
            indices[pos] += 1;
            if indices[pos] < rest[pos].len() {
                return true;
            }
            indices[pos] = 0;
        }
        false
    }

    fn next(&mut self, probe: &mut TimeoutProbe) -> Result<Option<Entry>, EvalError> {
        if !self.ready {
            self.materialize(probe)?;
            self.ready = true;
        }
        if self.empty {
            return Ok(None);
        }
        loop {
            if self.current.is_none() {
                match self.first.next(probe)? {
                    None => return Ok(None),
                    Some(entry) => {
                        self.indices = smallvec![0; self.rest.len()];
                        self.current = Some(entry);
                    }
                }
            }
            let Some(current) = &self.current else {
                continue;
            };

            // Bindings concatenate (slot sets are disjoint), counts multiply
            let mut key = current.key.clone();
            let mut count = current.count.saturating_mul(self.scalar);
            for (component, &index) in self.rest.iter().zip(self.indices.iter()) {
                let part = &component[index];
                for (slot, value) in part.key.iter().enumerate() {
                    if value.is_some() {
                        key[slot] = *value;
                    }
                }
                count = count.saturating_mul(part.count);
            }
            if self.modifier == Modifier::Distinct {
                count = 1;
            }

            if !Self::advance(&mut self.indices, &self.rest) {
                self.current = None;
            }
            probe.tick()?;
            return Ok(Some(Entry { key, count }));
        }
    }
}

enum State {
    Single(Evaluator),
    Cross(CrossProduct),
    Expired,
    Done,
}

/// Lazy multi-way join over boolean hypertries
///
/// Yields `Ok(entry)` per binding in a deterministic order (driven by the
/// estimator's label order and the sorted key order of each node), or a
/// single `Err` when the deadline fires; the iterator is fused afterwards.
pub struct Einsum {
    probe: TimeoutProbe,
    state: State,
}

impl Einsum {
    /// Build an evaluation of `subscript` over `operands`
    ///
    /// `operands[i]` must have depth equal to the length of the i-th operand
    /// label sequence.
    pub fn new(subscript: &Subscript, operands: &[BoolHypertrie], deadline: Deadline) -> Self {
        let probe = TimeoutProbe::new(deadline);
        if deadline.expired() {
            return Self {
                probe,
                state: State::Expired,
            };
        }

        let normalized = subscript.optimized();
        debug_assert_eq!(normalized.operand_labels().len(), operands.len());

        let modifier = normalized.modifier();
        let width = normalized.result_labels().len();
        let mut slots: Slots = Slots::default();
        for (pos, &label) in normalized.result_labels().iter().enumerate() {
            slots.entry(label).or_default().push(pos);
        }
        let slots = Arc::new(slots);

        let components = normalized.independent_components();
        if components.len() == 1 {
            let evaluator = Evaluator::new(
                normalized.operand_labels().to_vec(),
                operands.to_vec(),
                Arc::clone(&slots),
                width,
                modifier,
            );
            return Self {
                probe,
                state: State::Single(evaluator),
            };
        }

        // Partition operands among components by the labels they carry
        let mut membership: FxHashMap<Label, usize> = FxHashMap::default();
        for (idx, component) in components.iter().enumerate() {
            for label in component.labels() {
                membership.insert(label, idx);
            }
        }
        let mut operand_parts: Vec<Vec<BoolHypertrie>> = vec![Vec::new(); components.len()];
        for (row, operand) in normalized.operand_labels().iter().zip(operands.iter()) {
            if let Some(&idx) = row.first().and_then(|label| membership.get(label)) {
                operand_parts[idx].push(operand.clone());
            }
        }

        let mut evaluators: Vec<(Evaluator, bool)> = components
            .iter()
            .zip(operand_parts)
            .map(|(component, component_operands)| {
                let has_slots = !component.result_labels().is_empty();
                let evaluator = Evaluator::new(
                    component.operand_labels().to_vec(),
                    component_operands,
                    Arc::clone(&slots),
                    width,
                    modifier,
                );
                (evaluator, has_slots)
            })
            .collect();

        let first = match evaluators.iter().position(|(_, has_slots)| *has_slots) {
            Some(idx) => evaluators.remove(idx).0,
            // Nothing is projected: a unit stream carries the scalar factors
            None => Evaluator::unit(width, modifier),
        };

        Self {
            probe,
            state: State::Cross(CrossProduct::new(first, evaluators, modifier)),
        }
    }

    /// An evaluation that yields no bindings
    ///
    /// Used when slicing already proved the query empty.
    pub fn empty(deadline: Deadline) -> Self {
        Self {
            probe: TimeoutProbe::new(deadline),
            state: State::Done,
        }
    }

    /// The deadline this evaluation runs under
    pub fn deadline(&self) -> Deadline {
        self.probe.deadline()
    }
}

impl Iterator for Einsum {
    type Item = Result<Entry, EvalError>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = match &mut self.state {
            State::Done => return None,
            State::Expired => {
                self.state = State::Done;
                return Some(Err(EvalError::ProcessingTimeout));
            }
            State::Single(evaluator) => evaluator.next(&mut self.probe),
            State::Cross(cross) => cross.next(&mut self.probe),
        };
        match result {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.state = State::Done;
                None
            }
            Err(err) => {
                self.state = State::Done;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_model::{Dictionary, Term, TermId};

    fn ids(dict: &Dictionary, names: &[&str]) -> Vec<TermId> {
        names
            .iter()
            .map(|name| dict.intern(Term::iri(&format!("http://example.org/{name}"))))
            .collect()
    }

    fn subscript(rows: &[&str], result: &str, modifier: Modifier) -> Subscript {
        Subscript::new(
            rows.iter().map(|row| row.chars().collect()).collect(),
            result.chars().collect(),
            modifier,
        )
        .unwrap()
    }

    fn collect(einsum: Einsum) -> Vec<Entry> {
        einsum.map(|item| item.unwrap()).collect()
    }

    #[test]
    fn test_single_operand_enumeration() {
        let dict = Dictionary::new();
        let v = ids(&dict, &["a", "b", "c", "d"]);
        let mut trie = BoolHypertrie::new(2);
        trie.insert(&[v[0], v[1]]);
        trie.insert(&[v[2], v[3]]);

        let sub = subscript(&["xy"], "xy", Modifier::Counted);
        let entries = collect(Einsum::new(&sub, &[trie], Deadline::never()));

        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|entry| entry.count == 1));
        let keys: Vec<_> = entries.iter().map(|entry| entry.key.clone()).collect();
        assert!(keys.contains(&smallvec![Some(v[0]), Some(v[1])]));
        assert!(keys.contains(&smallvec![Some(v[2]), Some(v[3])]));
    }

    #[test]
    fn test_lonely_label_counts_as_factor() {
        let dict = Dictionary::new();
        let v = ids(&dict, &["a", "b", "c"]);
        let mut trie = BoolHypertrie::new(2);
        trie.insert(&[v[0], v[1]]);
        trie.insert(&[v[0], v[2]]);

        let counted = subscript(&["xy"], "x", Modifier::Counted);
        let entries = collect(Einsum::new(&counted, std::slice::from_ref(&trie), Deadline::never()));
        assert_eq!(entries, vec![Entry { key: smallvec![Some(v[0])], count: 2 }]);

        let distinct = subscript(&["xy"], "x", Modifier::Distinct);
        let entries = collect(Einsum::new(&distinct, &[trie], Deadline::never()));
        assert_eq!(entries, vec![Entry { key: smallvec![Some(v[0])], count: 1 }]);
    }

    #[test]
    fn test_repeated_result_label_fills_all_slots() {
        let dict = Dictionary::new();
        let v = ids(&dict, &["a", "b"]);
        let mut trie = BoolHypertrie::new(2);
        trie.insert(&[v[0], v[1]]);

        let sub = subscript(&["xy"], "xyx", Modifier::Counted);
        let entries = collect(Einsum::new(&sub, &[trie], Deadline::never()));
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].key.as_slice(),
            &[Some(v[0]), Some(v[1]), Some(v[0])]
        );
    }

    #[test]
    fn test_diagonal_label_within_one_operand() {
        let dict = Dictionary::new();
        let v = ids(&dict, &["a", "b"]);
        let mut trie = BoolHypertrie::new(2);
        trie.insert(&[v[0], v[0]]); // on the diagonal
        trie.insert(&[v[0], v[1]]);
        trie.insert(&[v[1], v[1]]); // on the diagonal

        let sub = subscript(&["xx"], "x", Modifier::Counted);
        let entries = collect(Einsum::new(&sub, &[trie], Deadline::never()));
        let keys: Vec<_> = entries.iter().map(|entry| entry.key[0]).collect();
        assert_eq!(keys, vec![Some(v[0]), Some(v[1])]);
    }

    #[test]
    fn test_no_projection_counts_homomorphisms() {
        let dict = Dictionary::new();
        let v = ids(&dict, &["a", "b", "c"]);
        let mut trie = BoolHypertrie::new(2);
        trie.insert(&[v[0], v[1]]);
        trie.insert(&[v[0], v[2]]);
        trie.insert(&[v[1], v[2]]);

        let sub = subscript(&["xy"], "", Modifier::Counted);
        let entries = collect(Einsum::new(&sub, &[trie], Deadline::never()));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].count, 3);
        assert!(entries[0].key.is_empty());
    }

    #[test]
    fn test_empty_operand_list_yields_unit() {
        let sub = subscript(&[], "", Modifier::Distinct);
        let entries = collect(Einsum::new(&sub, &[], Deadline::never()));
        assert_eq!(entries, vec![Entry { key: SmallVec::new(), count: 1 }]);
    }

    #[test]
    fn test_expired_deadline_fails_immediately() {
        let dict = Dictionary::new();
        let v = ids(&dict, &["a", "b"]);
        let mut trie = BoolHypertrie::new(2);
        trie.insert(&[v[0], v[1]]);

        let sub = subscript(&["xy"], "xy", Modifier::Counted);
        let deadline = Deadline::at(std::time::Instant::now() - std::time::Duration::from_millis(1));
        let mut einsum = Einsum::new(&sub, &[trie], deadline);

        assert_eq!(einsum.next(), Some(Err(EvalError::ProcessingTimeout)));
        assert_eq!(einsum.next(), None);
    }

    #[test]
    fn test_deterministic_order() {
        let dict = Dictionary::new();
        let v = ids(&dict, &["a", "b", "c", "d"]);
        let mut trie = BoolHypertrie::new(2);
        trie.insert(&[v[2], v[3]]);
        trie.insert(&[v[0], v[1]]);

        let sub = subscript(&["xy"], "xy", Modifier::Counted);
        let first = collect(Einsum::new(&sub, std::slice::from_ref(&trie), Deadline::never()));
        let second = collect(Einsum::new(&sub, &[trie], Deadline::never()));
        assert_eq!(first, second);
    }
}
