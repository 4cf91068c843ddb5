use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("identifier set is empty")]
pub struct EmptySet;

/// Set of item identifiers with ordered min/max.
#[derive(Debug, Clone, Default)]
pub struct IdSet {
    ids: BTreeSet<i64>,
}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id`; false when it was already present.
    pub fn add(&mut self, id: i64) -> bool {
        self.ids.insert(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn min(&self) -> Result<i64, EmptySet> {
        self.ids.first().copied().ok_or(EmptySet)
    }

    pub fn max(&self) -> Result<i64, EmptySet> {
        self.ids.last().copied().ok_or(EmptySet)
    }
}
