//! Cardinality estimation for join-label selection
//!
//! The planner is a single data-driven rule: the next label to resolve is
//! the one whose tightest bearing operand dimension holds the fewest
//! distinct IDs. Ties break towards the label with the highest degree in
//! the dependency graph, then towards the smaller label.
//!
//! Per-dimension cardinalities are maintained by the hypertrie at build
//! time, so an estimate is a handful of O(1) reads.

use crate::odg::OperandDependencyGraph;
use crate::subscript::{Label, LabelSeq, Subscript};
use hypertrie::BoolHypertrie;

/// Estimate for resolving one label against the current operands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabelEstimate {
    /// The estimated label
    pub label: Label,
    /// Upper bound on the number of distinct bindings the label enumerates
    pub estimate: u64,
    /// Operand holding the tightest bearing dimension
    pub operand: usize,
    /// The tightest bearing dimension within that operand
    pub dim: usize,
}

/// Estimate a label against raw rows and operands
///
/// `est(L) = min` over every operand dimension bearing `L` of that
/// dimension's cardinality; the minimizing `(operand, dim)` pair is the
/// preferred enumeration driver. Returns `None` if no operand bears the
/// label.
pub(crate) fn estimate_rows(
    rows: &[LabelSeq],
    operands: &[BoolHypertrie],
    label: Label,
) -> Option<LabelEstimate> {
    debug_assert_eq!(rows.len(), operands.len());

    let mut best: Option<LabelEstimate> = None;
    for (op_idx, row) in rows.iter().enumerate() {
        for (dim, &l) in row.iter().enumerate() {
            if l != label {
                continue;
            }
            let card = operands[op_idx].card(dim);
            if best.as_ref().is_none_or(|b| card < b.estimate) {
                best = Some(LabelEstimate {
                    label,
                    estimate: card,
                    operand: op_idx,
                    dim,
                });
            }
        }
    }
    best
}

/// Estimate a label of a subscript against its operand list
pub fn estimate(
    subscript: &Subscript,
    operands: &[BoolHypertrie],
    label: Label,
) -> Option<LabelEstimate> {
    estimate_rows(subscript.operand_labels(), operands, label)
}

/// Pick the next label to resolve from `candidates`
///
/// Smallest estimate wins; ties break by highest dependency-graph degree,
/// then by label order.
pub fn choose_label(
    rows: &[LabelSeq],
    operands: &[BoolHypertrie],
    candidates: &[Label],
) -> Option<LabelEstimate> {
    let odg = OperandDependencyGraph::from_rows(rows);

    let mut best: Option<(LabelEstimate, usize)> = None;
    for &label in candidates {
        let Some(est) = estimate_rows(rows, operands, label) else {
            continue;
        };
        let degree = odg.degree(label);
        let better = match &best {
            None => true,
            Some((current, current_degree)) => {
                (est.estimate, std::cmp::Reverse(degree), label)
                    < (
                        current.estimate,
                        std::cmp::Reverse(*current_degree),
                        current.label,
                    )
            }
        };
        if better {
            best = Some((est, degree));
        }
    }
    best.map(|(est, _)| est)
}
