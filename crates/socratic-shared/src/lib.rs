//! Shared types and state machines for the Socratic paste guard.
//!
//! Everything in this crate is synchronous and I/O-free except the score
//! store, so the lock/score invariants can be tested without an editor or
//! a mentor backend.

pub mod context;
pub mod editor;
pub mod error;
pub mod flow;
pub mod paste_guard;
pub mod score;
pub mod score_store;
pub mod session;
pub mod sse;
pub mod transcript;
pub mod undo_escape;
pub mod version;

pub use editor::{EditBuffer, TextEditor};
pub use error::SocraticError;
pub use paste_guard::{line_count, PasteEvent, PasteGuard};
pub use score::{BuilderScore, Penalty};
pub use session::{LockState, QuizPhase, Session, SessionEffect, SessionEvent, ValidationStatus};
pub use sse::{SseDecoder, SseFrame};
pub use transcript::{ChatTranscript, Role, Turn};
pub use undo_escape::{KeyDisposition, KeyStroke, UndoEscape, UndoOutcome};
pub use version::{EditorVersionId, VersionTracker};

/// Line count at which an insertion counts as a bulk paste
pub const DEFAULT_PASTE_THRESHOLD: usize = 25;

/// Fixed paste size used by the scripted demo flow
pub const DEMO_PASTE_LINE_COUNT: usize = 46;

/// Score deducted per pasted line
pub const PENALTY_PER_LINE: f64 = 0.2;

/// Score granted per debounced burst of typing
pub const TYPING_REWARD: f64 = 0.2;

/// Quiet period after the last growing change before a typing reward fires (ms)
pub const TYPING_DEBOUNCE_MS: u64 = 500;

/// Budget for the synchronous answer validation call (seconds)
pub const VALIDATE_TIMEOUT_SECS: u64 = 10;

/// Longest silence tolerated inside a streamed mentor reply (seconds)
pub const STREAM_IDLE_TIMEOUT_SECS: u64 = 30;

/// Highest question number sent for validation
pub const QUIZ_QUESTIONS: u8 = 2;
