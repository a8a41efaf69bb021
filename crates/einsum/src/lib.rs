//! Streaming Einstein summation over boolean hypertries
//!
//! A query is described by a [`Subscript`]: one label sequence per operand,
//! a result label sequence, and a modifier (counted or distinct). Evaluation
//! is a generalized tensor contraction: repeatedly pick the join label with
//! the smallest cardinality estimate, enumerate its candidate IDs by probing
//! every operand that bears it, slice, and recurse.
//!
//! The label co-occurrence graph ([`OperandDependencyGraph`]) splits a
//! subscript into independent components; their results combine as a cross
//! product, so two unrelated stars cost `|A| + |B|` instead of `|A| * |B|`.
//!
//! [`Einsum`] produces bindings lazily and probes its [`Deadline`]
//! cooperatively, so long-running joins terminate promptly once the deadline
//! passes.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cardinality;
mod odg;
mod operator;
mod subscript;
mod timeout;

pub use cardinality::{choose_label, estimate, LabelEstimate};
pub use odg::OperandDependencyGraph;
pub use operator::{Einsum, Entry, EvalError, ResultKey};
pub use subscript::{Label, LabelSeq, Modifier, Subscript, SubscriptError, MAX_LABELS};
pub use timeout::{Deadline, DeadlineExceeded, TimeoutProbe, PROBE_INTERVAL};
