//! Boolean hypertrie - a multi-dimensional boolean tensor over term IDs
//!
//! A hypertrie of depth `d` stores a set of `d`-tuples of [`rdf_model::TermId`]
//! and answers, for any tuple, whether it is present. Every node keeps one
//! sorted edge map **per dimension**, so any dimension can be fixed in O(log n)
//! without committing to a single index order up front.
//!
//! # Structure
//!
//! For a depth-3 trie holding `(s1, p1, o1), (s1, p2, o2), (s2, p1, o3)`,
//! dimension 0 of the root looks like:
//!
//! ```text
//! dim 0
//!  ├─ s1 → depth-2 trie over (p, o): {(p1, o1), (p2, o2)}
//!  └─ s2 → depth-2 trie over (p, o): {(p1, o3)}
//! ```
//!
//! with analogous maps for dimensions 1 and 2.
//!
//! # Operations
//!
//! - [`BoolHypertrie::slice`]: fix any subset of dimensions, yielding a
//!   lower-depth trie or a truth value
//! - [`BoolHypertrie::card`]: distinct values in one dimension, O(1)
//! - [`BoolHypertrie::keys`]: sorted streaming iteration over one dimension
//! - [`BoolHypertrie::diagonal`]: contract several dimensions onto one
//!
//! Tries are built once at load time and never mutated afterwards; subtries
//! share nodes by reference.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod key;
mod node;
mod trie;

pub use key::SliceKey;
pub use trie::{BoolHypertrie, Cell, CellIter, KeyIter, SliceResult};
