//! Session handles and per-session transaction state.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Handle of an open store session (one multi-document transaction).
///
/// Session IDs are monotonically increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Creates a new session ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// A buffered write inside a session.
#[derive(Debug, Clone)]
pub(crate) enum PendingWrite {
    /// Insert or replace a row with canonical CBOR bytes.
    Put(Vec<u8>),
    /// Remove a row.
    Delete,
}

/// Row address: (collection name, row id).
pub(crate) type RowKey = (String, u64);

/// Uncommitted state of a session.
///
/// Reads see committed data overlaid with this session's own writes. At
/// commit the store validates `observed` and `before_hashes` against the
/// committed state.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    /// Pending writes keyed by row.
    pub(crate) writes: BTreeMap<RowKey, PendingWrite>,
    /// Collection sequence observed at first read, per collection.
    pub(crate) observed: HashMap<String, u64>,
    /// SHA-256 of the committed row bytes a write was based on.
    pub(crate) before_hashes: HashMap<RowKey, [u8; 32]>,
}

impl SessionState {
    /// Pending writes for one collection, in row order.
    pub(crate) fn writes_for<'a>(
        &'a self,
        collection: &'a str,
    ) -> impl Iterator<Item = (u64, &'a PendingWrite)> + 'a {
        self.writes
            .iter()
            .filter(move |((name, _), _)| name == collection)
            .map(|((_, row), write)| (*row, write))
    }

    pub(crate) fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_display() {
        assert_eq!(SessionId::new(7).to_string(), "session:7");
    }

    #[test]
    fn writes_are_scoped_by_collection() {
        let mut state = SessionState::default();
        state
            .writes
            .insert(("sample".into(), 2), PendingWrite::Delete);
        state
            .writes
            .insert(("family".into(), 1), PendingWrite::Put(vec![0xa0]));
        let rows: Vec<u64> = state.writes_for("sample").map(|(row, _)| row).collect();
        assert_eq!(rows, vec![2]);
        assert!(!state.is_read_only());
    }
}
