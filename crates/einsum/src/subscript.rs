//! Subscripts - the normalized description of one tensor contraction
//!
//! A subscript is written the way einsum expressions usually are:
//! `"xy,yz->xz"` means two depth-2 operands joined on `y`, projecting
//! `x` and `z`. Labels are single characters; at most [`MAX_LABELS`]
//! distinct labels may occur in one subscript.

use crate::odg::OperandDependencyGraph;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;

/// A single-character query-variable label inside a subscript
pub type Label = char;

/// The label sequence of one operand (length = operand depth)
pub type LabelSeq = SmallVec<[Label; 3]>;

/// Maximum number of distinct labels per subscript
pub const MAX_LABELS: usize = 63;

/// Result modifier of a contraction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modifier {
    /// Emit every binding with its multiplicity
    Counted,
    /// Emit every distinct binding exactly once, count forced to 1
    Distinct,
}

/// Errors raised when constructing a subscript
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptError {
    /// A result label does not occur in any operand
    #[error("result label '{0}' does not appear in any operand")]
    UnboundResultLabel(Label),

    /// The label alphabet is exhausted
    #[error("too many distinct labels: {0} (max {MAX_LABELS})")]
    TooManyLabels(usize),
}

/// Operand label sequences, result label sequence, and modifier
///
/// Invariants: every result label occurs in some operand; a label occurring
/// in two or more operand slots is a *join* label, one occurring exactly
/// once is *lonely*.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscript {
    operand_labels: Vec<LabelSeq>,
    result_labels: LabelSeq,
    modifier: Modifier,
    /// One entry per connected component when the dependency graph splits;
    /// empty for single-component subscripts
    sub_subscripts: Vec<Subscript>,
    optimized: bool,
}

impl Subscript {
    /// Create a subscript, validating its invariants
    pub fn new(
        operand_labels: Vec<LabelSeq>,
        result_labels: LabelSeq,
        modifier: Modifier,
    ) -> Result<Self, SubscriptError> {
        let distinct: BTreeSet<Label> = operand_labels.iter().flatten().copied().collect();
        if distinct.len() > MAX_LABELS {
            return Err(SubscriptError::TooManyLabels(distinct.len()));
        }
        for &label in &result_labels {
            if !distinct.contains(&label) {
                return Err(SubscriptError::UnboundResultLabel(label));
            }
        }
        Ok(Self {
            operand_labels,
            result_labels,
            modifier,
            sub_subscripts: Vec::new(),
            optimized: false,
        })
    }

    fn with_parts(
        operand_labels: Vec<LabelSeq>,
        result_labels: LabelSeq,
        modifier: Modifier,
    ) -> Self {
        Self {
            operand_labels,
            result_labels,
            modifier,
            sub_subscripts: Vec::new(),
            optimized: false,
        }
    }

    /// Label sequences of all operands
    pub fn operand_labels(&self) -> &[LabelSeq] {
        &self.operand_labels
    }

    /// The projection label sequence (may contain repeats)
    pub fn result_labels(&self) -> &[Label] {
        &self.result_labels
    }

    /// The result modifier
    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    /// All distinct labels in sorted order
    pub fn labels(&self) -> Vec<Label> {
        let set: BTreeSet<Label> = self.operand_labels.iter().flatten().copied().collect();
        set.into_iter().collect()
    }

    /// Number of operand slots the label occupies
    pub fn occurrence_count(&self, label: Label) -> usize {
        self.operand_labels
            .iter()
            .flatten()
            .filter(|&&l| l == label)
            .count()
    }

    /// A label is a join label iff it occupies two or more operand slots
    pub fn is_join_label(&self, label: Label) -> bool {
        self.occurrence_count(label) >= 2
    }

    /// A label is lonely iff it occupies exactly one operand slot
    pub fn is_lonely_label(&self, label: Label) -> bool {
        self.occurrence_count(label) == 1
    }

    /// Check whether the label occurs in the result sequence
    pub fn is_result_label(&self, label: Label) -> bool {
        self.result_labels.contains(&label)
    }

    /// All join labels in sorted order
    pub fn join_labels(&self) -> Vec<Label> {
        self.labels()
            .into_iter()
            .filter(|&l| self.is_join_label(l))
            .collect()
    }

    /// All lonely labels in sorted order
    pub fn lonely_labels(&self) -> Vec<Label> {
        self.labels()
            .into_iter()
            .filter(|&l| self.is_lonely_label(l))
            .collect()
    }

    /// The label co-occurrence graph of this subscript
    pub fn odg(&self) -> OperandDependencyGraph {
        OperandDependencyGraph::from_rows(&self.operand_labels)
    }

    /// True when no labels remain
    pub fn is_leaf(&self) -> bool {
        self.operand_labels.iter().all(|row| row.is_empty())
    }

    /// Normalize the subscript
    ///
    /// Splits it into sub-subscripts along the connected components of the
    /// dependency graph; each sub-subscript keeps the projection labels that
    /// fall into its component, order preserved. Idempotent.
    pub fn optimized(&self) -> Subscript {
        if self.optimized {
            return self.clone();
        }

        let components = self.odg().components();
        let mut normalized = self.clone();
        normalized.optimized = true;
        if components.len() <= 1 {
            return normalized;
        }

        normalized.sub_subscripts = components
            .iter()
            .map(|component| {
                let members: BTreeSet<Label> = component.iter().copied().collect();
                let rows: Vec<LabelSeq> = self
                    .operand_labels
                    .iter()
                    .filter(|row| row.first().is_some_and(|l| members.contains(l)))
                    .cloned()
                    .collect();
                let result: LabelSeq = self
                    .result_labels
                    .iter()
                    .copied()
                    .filter(|l| members.contains(l))
                    .collect();
                let mut sub = Subscript::with_parts(rows, result, self.modifier);
                sub.optimized = true;
                sub
            })
            .collect();
        normalized
    }

    /// The connected components as standalone subscripts
    ///
    /// A single-component subscript yields itself.
    pub fn independent_components(&self) -> Vec<Subscript> {
        if !self.optimized {
            return self.optimized().independent_components();
        }
        if self.sub_subscripts.is_empty() {
            vec![self.clone()]
        } else {
            self.sub_subscripts.clone()
        }
    }

    /// The residual subscript after `label` has been bound
    ///
    /// Every occurrence of the label is removed; operands whose label
    /// sequence becomes empty drop out entirely.
    pub fn remove_label(&self, label: Label) -> Subscript {
        let rows: Vec<LabelSeq> = self
            .operand_labels
            .iter()
            .map(|row| row.iter().copied().filter(|&l| l != label).collect())
            .filter(|row: &LabelSeq| !row.is_empty())
            .collect();
        let result: LabelSeq = self
            .result_labels
            .iter()
            .copied()
            .filter(|&l| l != label)
            .collect();
        Subscript::with_parts(rows, result, self.modifier)
    }
}

impl fmt::Display for Subscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.operand_labels.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            for label in row {
                write!(f, "{label}")?;
            }
        }
        write!(f, "->")?;
        for label in &self.result_labels {
            write!(f, "{label}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn subscript(rows: &[&str], result: &str, modifier: Modifier) -> Subscript {
        let operand_labels = rows.iter().map(|row| row.chars().collect()).collect();
        Subscript::new(operand_labels, result.chars().collect(), modifier).unwrap()
    }

    #[test]
    fn test_join_and_lonely_labels() {
        let sub = subscript(&["xy", "xz"], "yz", Modifier::Counted);
        assert_eq!(sub.join_labels(), vec!['x']);
        assert_eq!(sub.lonely_labels(), vec!['y', 'z']);
        assert!(sub.is_result_label('y'));
        assert!(!sub.is_result_label('x'));
    }

    #[test]
    fn test_repeated_label_within_operand_is_join() {
        let sub = subscript(&["xx"], "x", Modifier::Counted);
        assert!(sub.is_join_label('x'));
    }

    #[test]
    fn test_unbound_result_label_rejected() {
        let err = Subscript::new(
            vec![smallvec!['x', 'y']],
            smallvec!['z'],
            Modifier::Counted,
        )
        .unwrap_err();
        assert_eq!(err, SubscriptError::UnboundResultLabel('z'));
    }

    #[test]
    fn test_optimized_is_idempotent() {
        let sub = subscript(&["xy", "zw"], "xz", Modifier::Counted);
        let once = sub.optimized();
        let twice = once.optimized();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_component_split() {
        let sub = subscript(&["xy", "zw"], "xz", Modifier::Counted);
        let components = sub.independent_components();
        assert_eq!(components.len(), 2);
        // Components are ordered by their smallest label: {w, z} before {x, y}
        assert_eq!(components[0].operand_labels()[0].as_slice(), &['z', 'w']);
        assert_eq!(components[0].result_labels(), &['z']);
        assert_eq!(components[1].result_labels(), &['x']);
    }

    #[test]
    fn test_single_component_yields_itself() {
        let sub = subscript(&["xy", "yz"], "xz", Modifier::Counted);
        let components = sub.independent_components();
        assert_eq!(components.len(), 1);
        assert_eq!(components[0].operand_labels(), sub.operand_labels());
    }

    #[test]
    fn test_remove_label() {
        let sub = subscript(&["xy", "yz"], "xz", Modifier::Counted);
        let residual = sub.remove_label('y');
        assert_eq!(residual.operand_labels().len(), 2);
        assert_eq!(residual.operand_labels()[0].as_slice(), &['x']);
        assert_eq!(residual.operand_labels()[1].as_slice(), &['z']);
        assert_eq!(residual.result_labels(), &['x', 'z']);
    }

    #[test]
    fn test_remove_label_drops_empty_operands() {
        let sub = subscript(&["x", "xy"], "y", Modifier::Counted);
        let residual = sub.remove_label('x');
        assert_eq!(residual.operand_labels().len(), 1);
        assert_eq!(residual.operand_labels()[0].as_slice(), &['y']);
        assert!(!residual.is_leaf());
        assert!(residual.remove_label('y').is_leaf());
    }

    #[test]
    fn test_display() {
        let sub = subscript(&["xy", "yz"], "xz", Modifier::Counted);
        assert_eq!(sub.to_string(), "xy,yz->xz");
    }
}
