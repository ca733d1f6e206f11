//! The text-editing collaborator.
//!
//! The paste guard only needs an editor that reports a version id with
//! "alternative version" semantics: a fresh edit gets a new, larger id; an
//! undo puts back the id the document had before the undone edit. The
//! `TextEditor` trait is that capability; `EditBuffer` is a plain in-memory
//! implementation used by the CLI and the tests.

use crate::error::SocraticError;
use crate::version::EditorVersionId;

/// Maximum undo history kept by `EditBuffer`
pub const UNDO_CAP: usize = 1000;

/// Capability the session requires from whatever component edits the text.
pub trait TextEditor {
    /// Id of the current content state.
    fn version_id(&self) -> EditorVersionId;

    /// Full document text.
    fn text(&self) -> &str;

    /// Insert `text` at byte `offset` as one undo step.
    fn insert(&mut self, offset: usize, text: &str) -> Result<EditorVersionId, SocraticError>;

    /// Delete the byte range `start..end` as one undo step.
    fn delete(&mut self, start: usize, end: usize) -> Result<EditorVersionId, SocraticError>;

    /// Revert the most recent step. Returns false when there is nothing to undo.
    fn undo(&mut self) -> bool;

    /// Re-apply the most recently undone step.
    fn redo(&mut self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EditOp {
    Insert { pos: usize, text: String },
    Delete { pos: usize, text: String },
}

#[derive(Debug, Clone)]
struct UndoEntry {
    op: EditOp,
    version_before: EditorVersionId,
    version_after: EditorVersionId,
}

/// In-memory document with an undo/redo stack.
#[derive(Debug, Clone)]
pub struct EditBuffer {
    text: String,
    version: EditorVersionId,
    /// Last id handed out; fresh edits always go above it
    issued: u64,
    undo: Vec<UndoEntry>,
    redo: Vec<UndoEntry>,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::from_text("")
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            version: EditorVersionId::INITIAL,
            issued: EditorVersionId::INITIAL.get(),
            undo: Vec::new(),
            redo: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append at the end of the document.
    pub fn append(&mut self, text: &str) -> Result<EditorVersionId, SocraticError> {
        self.insert(self.text.len(), text)
    }

    fn check_offset(&self, offset: usize) -> Result<(), SocraticError> {
        if offset > self.text.len() {
            return Err(SocraticError::EditOutOfRange {
                offset,
                len: self.text.len(),
            });
        }
        if !self.text.is_char_boundary(offset) {
            return Err(SocraticError::NotCharBoundary(offset));
        }
        Ok(())
    }

    fn record(&mut self, op: EditOp) -> EditorVersionId {
        self.issued += 1;
        let entry = UndoEntry {
            op,
            version_before: self.version,
            version_after: EditorVersionId(self.issued),
        };
        self.version = entry.version_after;
        self.undo.push(entry);
        if self.undo.len() > UNDO_CAP {
            self.undo.drain(0..(self.undo.len() - UNDO_CAP));
        }
        self.redo.clear();
        self.version
    }

    fn apply(&mut self, op: &EditOp) {
        match op {
            EditOp::Insert { pos, text } => self.text.insert_str(*pos, text),
            EditOp::Delete { pos, text } => {
                self.text.replace_range(*pos..*pos + text.len(), "");
            }
        }
    }

    fn revert(&mut self, op: &EditOp) {
        match op {
            EditOp::Insert { pos, text } => {
                self.text.replace_range(*pos..*pos + text.len(), "");
            }
            EditOp::Delete { pos, text } => self.text.insert_str(*pos, text),
        }
    }
}

impl Default for EditBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextEditor for EditBuffer {
    fn version_id(&self) -> EditorVersionId {
        self.version
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn insert(&mut self, offset: usize, text: &str) -> Result<EditorVersionId, SocraticError> {
        self.check_offset(offset)?;
        if text.is_empty() {
            return Ok(self.version);
        }
        let op = EditOp::Insert {
            pos: offset,
            text: text.to_string(),
        };
        self.apply(&op);
        Ok(self.record(op))
    }

    fn delete(&mut self, start: usize, end: usize) -> Result<EditorVersionId, SocraticError> {
        self.check_offset(start)?;
        self.check_offset(end)?;
        if start >= end {
            return Ok(self.version);
        }
        let op = EditOp::Delete {
            pos: start,
            text: self.text[start..end].to_string(),
        };
        self.apply(&op);
        Ok(self.record(op))
    }

    fn undo(&mut self) -> bool {
        let Some(entry) = self.undo.pop() else {
            return false;
        };
        self.revert(&entry.op);
        self.version = entry.version_before;
        self.redo.push(entry);
        true
    }

    fn redo(&mut self) -> bool {
        let Some(entry) = self.redo.pop() else {
            return false;
        };
        self.apply(&entry.op);
        self.version = entry.version_after;
        self.undo.push(entry);
        true
    }
}
