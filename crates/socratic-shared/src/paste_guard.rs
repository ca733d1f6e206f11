//! Paste Guard: flags bulk pastes.
//!
//! A paste qualifies when its inserted text spans at least `threshold`
//! newline-separated lines and is not a re-paste of text the user copied or
//! cut inside the same document.

use crate::version::{EditorVersionId, VersionTracker};
use crate::DEFAULT_PASTE_THRESHOLD;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A detected bulk paste. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasteEvent {
    pub pasted_text: String,
    /// Always >= 1
    pub line_count: usize,
    /// Version id the document had right before the paste was applied
    pub pre_paste_version: EditorVersionId,
}

/// Number of `'\n'`-separated segments in `text`.
///
/// `""` and `"a"` are one line, `"a\n"` is two.
pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

#[derive(Debug, Clone)]
pub struct PasteGuard {
    threshold: usize,
    versions: VersionTracker,
    last_copied: Option<String>,
}

impl PasteGuard {
    pub fn new(threshold: usize, initial: EditorVersionId) -> Self {
        Self {
            threshold: threshold.max(1),
            versions: VersionTracker::new(initial),
            last_copied: None,
        }
    }

    /// Feed the version id reported after a content change.
    ///
    /// Changes while locked are not tracked: the only edits that get through
    /// then are undo steps, and the pair is resynced on unlock.
    pub fn observe_change(&mut self, id: EditorVersionId, locked: bool) {
        if locked {
            return;
        }
        self.versions.observe(id);
    }

    /// Call after the session unlocks so the next paste is measured from
    /// the editor's actual state.
    pub fn resync(&mut self, id: EditorVersionId) {
        self.versions.resync(id);
    }

    /// Remember text placed on the clipboard by a copy or cut in the editor.
    pub fn record_copy(&mut self, text: &str) {
        self.last_copied = Some(text.to_string());
    }

    /// Classify a paste whose content change was already observed.
    pub fn classify(&self, pasted_text: &str, locked: bool) -> Option<PasteEvent> {
        if locked {
            debug!("Paste ignored: session already locked");
            return None;
        }

        let lines = line_count(pasted_text);
        if lines < self.threshold {
            return None;
        }

        if self.last_copied.as_deref() == Some(pasted_text) {
            debug!("Internal paste of {} lines exempted", lines);
            return None;
        }

        Some(PasteEvent {
            pasted_text: pasted_text.to_string(),
            line_count: lines,
            pre_paste_version: self.versions.previous(),
        })
    }
}

impl Default for PasteGuard {
    fn default() -> Self {
        Self::new(DEFAULT_PASTE_THRESHOLD, EditorVersionId::INITIAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> String {
        (0..n).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count(""), 1);
        assert_eq!(line_count("a"), 1);
        assert_eq!(line_count("a\n"), 2);
        assert_eq!(line_count(&lines(30)), 30);
    }

    #[test]
    fn test_below_threshold_is_noop() {
        let guard = PasteGuard::default();
        assert!(guard.classify(&lines(24), false).is_none());
    }

    #[test]
    fn test_at_threshold_qualifies() {
        let mut guard = PasteGuard::default();
        guard.observe_change(EditorVersionId(2), false);
        let event = guard.classify(&lines(25), false).unwrap();
        assert_eq!(event.line_count, 25);
        assert_eq!(event.pre_paste_version, EditorVersionId::INITIAL);
    }

    #[test]
    fn test_locked_paste_ignored() {
        let guard = PasteGuard::default();
        assert!(guard.classify(&lines(100), true).is_none());
    }

    #[test]
    fn test_internal_paste_exempt() {
        let mut guard = PasteGuard::default();
        let block = lines(40);
        guard.record_copy(&block);
        assert!(guard.classify(&block, false).is_none());
        // Different text of the same size still counts
        assert!(guard.classify(&lines(41), false).is_some());
    }

    #[test]
    fn test_changes_while_locked_not_tracked() {
        let mut guard = PasteGuard::new(25, EditorVersionId(5));
        guard.observe_change(EditorVersionId(6), false);
        guard.observe_change(EditorVersionId(5), true);
        guard.observe_change(EditorVersionId(7), false);
        assert_eq!(guard.classify(&lines(30), false).unwrap().pre_paste_version, EditorVersionId(6));
    }
}
