//! Slice keys for fixing hypertrie dimensions

use rdf_model::TermId;
use smallvec::SmallVec;

/// A slice key: one entry per dimension, `Some(id)` fixes the dimension to
/// that term, `None` leaves it as a wildcard
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SliceKey(SmallVec<[Option<TermId>; 3]>);

impl SliceKey {
    /// Create a slice key from per-dimension entries
    pub fn new(parts: impl IntoIterator<Item = Option<TermId>>) -> Self {
        Self(parts.into_iter().collect())
    }

    /// An all-wildcard key of the given length
    pub fn wildcards(len: usize) -> Self {
        Self(std::iter::repeat(None).take(len).collect())
    }

    /// A key of length `len` fixing each dimension in `positions` to `id`
    pub fn fixing(len: usize, positions: &[usize], id: TermId) -> Self {
        let mut key = Self::wildcards(len);
        for &pos in positions {
            key.0[pos] = Some(id);
        }
        key
    }

    /// Number of dimensions covered by this key
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the key has no dimensions
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of wildcard entries
    pub fn wildcard_count(&self) -> usize {
        self.0.iter().filter(|part| part.is_none()).count()
    }

    /// The per-dimension entries
    pub fn parts(&self) -> &[Option<TermId>] {
        &self.0
    }

    /// Iterate the fixed dimensions as `(dimension, id)` pairs
    pub fn fixed(&self) -> impl Iterator<Item = (usize, TermId)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(dim, part)| part.map(|id| (dim, id)))
    }
}

impl From<Vec<Option<TermId>>> for SliceKey {
    fn from(parts: Vec<Option<TermId>>) -> Self {
        Self(parts.into())
    }
}

impl<const N: usize> From<[Option<TermId>; N]> for SliceKey {
    fn from(parts: [Option<TermId>; N]) -> Self {
        Self(parts.into_iter().collect())
    }
}
