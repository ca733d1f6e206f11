//! Editor version ids and the previous/current pair used to find the
//! pre-paste version.

use serde::{Deserialize, Serialize};

/// Opaque id the editing component assigns after every content mutation.
///
/// Only compared for equality and ordering. Fresh edits always receive an id
/// greater than any issued before; undo and redo restore earlier ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditorVersionId(pub u64);

impl EditorVersionId {
    pub const INITIAL: EditorVersionId = EditorVersionId(1);

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EditorVersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Tracks the version id before and after the most recent change.
///
/// By the time a paste is classified the editor already reports the
/// post-paste id, so the id to restore is the one shifted into `previous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionTracker {
    previous: EditorVersionId,
    current: EditorVersionId,
}

impl VersionTracker {
    pub fn new(initial: EditorVersionId) -> Self {
        Self {
            previous: initial,
            current: initial,
        }
    }

    /// Record the id reported after a content change.
    pub fn observe(&mut self, id: EditorVersionId) {
        self.previous = self.current;
        self.current = id;
    }

    /// Forget history, e.g. after the session unlocks and the editor state
    /// was moved by undo without being observed.
    pub fn resync(&mut self, id: EditorVersionId) {
        self.previous = id;
        self.current = id;
    }

    pub fn previous(&self) -> EditorVersionId {
        self.previous
    }

    pub fn current(&self) -> EditorVersionId {
        self.current
    }
}

impl Default for VersionTracker {
    fn default() -> Self {
        Self::new(EditorVersionId::INITIAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_shifts_pair() {
        let mut t = VersionTracker::new(EditorVersionId(3));
        t.observe(EditorVersionId(4));
        assert_eq!(t.previous(), EditorVersionId(3));
        assert_eq!(t.current(), EditorVersionId(4));
        t.observe(EditorVersionId(7));
        assert_eq!(t.previous(), EditorVersionId(4));
    }

    #[test]
    fn test_resync_collapses_pair() {
        let mut t = VersionTracker::default();
        t.observe(EditorVersionId(9));
        t.resync(EditorVersionId(2));
        assert_eq!(t.previous(), t.current());
    }

    #[test]
    fn test_ordering() {
        assert!(EditorVersionId(2) < EditorVersionId(10));
        assert_eq!(EditorVersionId(5).to_string(), "v5");
    }
}
