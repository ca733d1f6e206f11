//! Practice session controller.
//!
//! Single owner of the edit buffer, the guard state machines, the mentor
//! client and the score store. Session events are applied strictly in order
//! on the owner's task. The first quiz question streams on a spawned task
//! and comes back as `StreamEvent`s, so undo and reset stay available while
//! it is in flight.

use crate::logging::SessionLog;
use anyhow::{Context, Result};
use socratic_common::{
    MentorChatRequest, MentorClient, MentorError, RunResult, SocraticConfig, StreamSessions,
};
use socratic_shared::flow::{FlowState, FlowTracker};
use socratic_shared::score::TypingDebounce;
use socratic_shared::score_store::ScoreStore;
use socratic_shared::session::{UnlockReason, FALLBACK_QUESTION};
use socratic_shared::undo_escape::Key;
use socratic_shared::{
    EditBuffer, KeyDisposition, KeyStroke, PasteGuard, QuizPhase, Session, SessionEffect,
    SessionEvent, TextEditor, UndoEscape, UndoOutcome, ValidationStatus,
};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What an input did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    /// Delivered to the editor
    Applied,
    /// Blocked while locked
    Suppressed,
    /// Input had no editing effect (cursor keys, unknown chords)
    Ignored,
    /// A bulk paste locked the session; the first question is streaming
    Locked { line_count: usize, penalty: f64 },
    /// Undo allowed but the paste is not fully reverted yet
    UndoStep,
    Unlocked { refunded: f64 },
    /// The mentor chord was pressed
    MentorRequested,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// No question is waiting for an answer
    NotAsked,
    NextQuestion(String),
    /// Answer rejected; same question again
    Retry(String),
    Passed {
        feedback: String,
        refunded: f64,
        failed_open: bool,
    },
}

/// Sent back by a spawned question stream, tagged with its generation.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Chunk { generation: u64, text: String },
    Finished { generation: u64 },
    Failed { generation: u64, error: String },
}

impl StreamEvent {
    pub fn generation(&self) -> u64 {
        match self {
            StreamEvent::Chunk { generation, .. }
            | StreamEvent::Finished { generation }
            | StreamEvent::Failed { generation, .. } => *generation,
        }
    }
}

/// What applying a `StreamEvent` did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// Superseded or cancelled stream; nothing applied
    Stale,
    Chunk(String),
    /// The first question is complete
    QuestionReady(String),
    /// Stream failed; the fallback question stands in
    Fallback(String),
}

pub struct Controller {
    editor: EditBuffer,
    guard: PasteGuard,
    escape: UndoEscape,
    session: Session,
    flow: FlowTracker,
    debounce: TypingDebounce,
    client: MentorClient,
    streams: StreamSessions,
    store: ScoreStore,
    log: SessionLog,
    context_summary: String,
    events_tx: mpsc::UnboundedSender<StreamEvent>,
    events: mpsc::UnboundedReceiver<StreamEvent>,
}

impl Controller {
    pub fn new(config: &SocraticConfig, initial_text: &str, log: SessionLog) -> Result<Self> {
        let client = MentorClient::from_config(config).context("creating mentor client")?;
        let store = ScoreStore::new(&config.state_dir());
        let score = store.load();
        let editor = EditBuffer::from_text(initial_text);
        let mut debounce = TypingDebounce::default();
        debounce.baseline(editor.len());
        let (events_tx, events) = mpsc::unbounded_channel();

        Ok(Self {
            guard: PasteGuard::new(config.paste_threshold, editor.version_id()),
            escape: UndoEscape::default(),
            session: Session::new(score, config.score_rates()),
            flow: FlowTracker::new(),
            debounce,
            client,
            streams: StreamSessions::new(),
            store,
            log,
            context_summary: String::new(),
            events_tx,
            events,
            editor,
        })
    }

    /// Text sent as `context_summary` with paste analysis requests.
    pub fn with_context_summary(mut self, summary: String) -> Self {
        self.context_summary = summary;
        self
    }

    pub fn text(&self) -> &str {
        self.editor.text()
    }

    pub fn editor(&self) -> &EditBuffer {
        &self.editor
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn score(&self) -> f64 {
        self.session.score()
    }

    pub fn is_locked(&self) -> bool {
        self.session.is_locked()
    }

    pub fn session_id(&self) -> &str {
        self.log.session_id()
    }

    /// The question the user is expected to answer, if any.
    pub fn current_question(&self) -> Option<&str> {
        match self.session.phase() {
            QuizPhase::Answering { .. } => self
                .session
                .transcript()
                .last_mentor()
                .map(|t| t.text.as_str()),
            _ => None,
        }
    }

    /// Locked and still waiting for the first question.
    pub fn question_pending(&self) -> bool {
        self.session.phase() == QuizPhase::AwaitingQuestion
    }

    pub fn flow_state(&self, now: Instant) -> FlowState {
        self.flow.state(now)
    }

    pub fn type_text(&mut self, text: &str) -> Result<InputOutcome> {
        if self.session.is_locked() {
            return Ok(InputOutcome::Suppressed);
        }
        let now = Instant::now();
        self.editor.append(text)?;
        for _ in text.chars() {
            self.flow.register_keystroke(now);
        }
        self.after_edit(now);
        Ok(InputOutcome::Applied)
    }

    /// Copy lines `first..=last` (1-based) to the internal clipboard.
    pub fn copy(&mut self, first: usize, last: usize) -> Result<InputOutcome> {
        if self.session.is_locked() {
            return Ok(InputOutcome::Suppressed);
        }
        let (start, end) = self.line_range(first, last)?;
        let text = self.editor.text()[start..end].to_string();
        self.guard.record_copy(&text);
        Ok(InputOutcome::Applied)
    }

    /// Cut lines `first..=last` (1-based) to the internal clipboard.
    pub fn cut(&mut self, first: usize, last: usize) -> Result<InputOutcome> {
        if self.session.is_locked() {
            return Ok(InputOutcome::Suppressed);
        }
        let (start, end) = self.line_range(first, last)?;
        let text = self.editor.text()[start..end].to_string();
        self.guard.record_copy(&text);
        self.editor.delete(start, end)?;
        self.after_edit(Instant::now());
        Ok(InputOutcome::Applied)
    }

    /// Insert `text` at the end of the document as one paste.
    ///
    /// A qualifying paste locks the session and starts streaming the first
    /// question; its text arrives through `next_stream_event`.
    pub fn paste(&mut self, text: &str) -> Result<InputOutcome> {
        if self.session.is_locked() {
            debug!("Paste suppressed while locked");
            return Ok(InputOutcome::Suppressed);
        }
        self.editor.append(text)?;
        self.after_edit(Instant::now());

        let Some(event) = self.guard.classify(text, false) else {
            return Ok(InputOutcome::Applied);
        };
        self.debounce.cancel();
        self.escape.arm(event.pre_paste_version);

        let mut outcome = InputOutcome::Applied;
        for effect in self.session.apply(SessionEvent::PasteDetected(event)) {
            match effect {
                SessionEffect::Locked {
                    line_count,
                    penalty,
                } => {
                    self.persist();
                    let mut entry = self.log.entry("locked", self.session.score());
                    entry.line_count = Some(line_count);
                    entry.penalty = Some(penalty);
                    self.log.record(&entry);
                    outcome = InputOutcome::Locked {
                        line_count,
                        penalty,
                    };
                }
                SessionEffect::RequestQuestion { code_snippet } => {
                    self.spawn_question(code_snippet);
                }
                other => debug!("Unhandled paste effect {:?}", other),
            }
        }
        Ok(outcome)
    }

    fn spawn_question(&mut self, code_snippet: String) {
        let ticket = self.streams.begin();
        let generation = ticket.generation();
        let client = self.client.clone();
        let context_summary = self.context_summary.clone();
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let chunks = tx.clone();
            let result = client
                .analyze_paste(&code_snippet, &context_summary, ticket.token(), |chunk| {
                    let _ = chunks.send(StreamEvent::Chunk {
                        generation,
                        text: chunk.to_string(),
                    });
                })
                .await;
            let event = match result {
                Ok(()) => StreamEvent::Finished { generation },
                Err(MentorError::Aborted) => {
                    debug!("Question stream {} aborted", generation);
                    return;
                }
                Err(e) => StreamEvent::Failed {
                    generation,
                    error: e.to_string(),
                },
            };
            let _ = tx.send(event);
        });
    }

    /// Next event from a question stream. Cancel-safe, for use in
    /// `tokio::select!`.
    pub async fn next_stream_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Apply an event from a question stream. Events from a superseded or
    /// cancelled stream are dropped.
    pub fn apply_stream_event(&mut self, event: StreamEvent) -> StreamUpdate {
        if !self.streams.is_current_generation(event.generation()) {
            debug!("Dropping event of stale stream {}", event.generation());
            return StreamUpdate::Stale;
        }
        match event {
            StreamEvent::Chunk { text, .. } => {
                self.session.apply(SessionEvent::MentorChunk(text.clone()));
                StreamUpdate::Chunk(text)
            }
            StreamEvent::Finished { .. } => {
                self.streams.cancel();
                self.session.apply(SessionEvent::QuestionReady);
                StreamUpdate::QuestionReady(self.question_text())
            }
            StreamEvent::Failed { error, .. } => {
                warn!("Question stream failed: {}", error);
                self.streams.cancel();
                self.session.apply(SessionEvent::QuestionFailed(error));
                StreamUpdate::Fallback(self.question_text())
            }
        }
    }

    fn question_text(&self) -> String {
        self.current_question()
            .unwrap_or(FALLBACK_QUESTION)
            .to_string()
    }

    pub fn key(&mut self, key: &KeyStroke) -> Result<InputOutcome> {
        match self.escape.intercept(key) {
            KeyDisposition::Suppress => Ok(InputOutcome::Suppressed),
            KeyDisposition::AllowUndo => {
                self.editor.undo();
                match self.escape.after_undo(self.editor.version_id()) {
                    UndoOutcome::Reverted => {
                        let effects = self.session.apply(SessionEvent::UndoReverted);
                        Ok(match self.finish_unlock(effects) {
                            Some(refunded) => InputOutcome::Unlocked { refunded },
                            None => InputOutcome::Applied,
                        })
                    }
                    UndoOutcome::StillLocked => Ok(InputOutcome::UndoStep),
                    UndoOutcome::NotLocked => Ok(InputOutcome::Ignored),
                }
            }
            KeyDisposition::PassThrough => self.apply_key(key),
        }
    }

    fn apply_key(&mut self, key: &KeyStroke) -> Result<InputOutcome> {
        if key.is_mentor_chord() {
            return Ok(InputOutcome::MentorRequested);
        }
        if key.is_undo_chord() || key.is_redo_chord() {
            let changed = if key.is_undo_chord() {
                self.editor.undo()
            } else {
                self.editor.redo()
            };
            if changed {
                self.after_edit(Instant::now());
            }
            return Ok(InputOutcome::Applied);
        }
        if key.ctrl || key.meta {
            return Ok(InputOutcome::Ignored);
        }

        match key.key {
            Key::Char(c) => self.type_text(&c.to_string()),
            Key::Enter => self.type_text("\n"),
            Key::Tab => self.type_text("\t"),
            Key::Backspace => {
                let Some((last, _)) = self.editor.text().char_indices().last() else {
                    return Ok(InputOutcome::Ignored);
                };
                let len = self.editor.len();
                self.editor.delete(last, len)?;
                self.after_edit(Instant::now());
                Ok(InputOutcome::Applied)
            }
            _ => Ok(InputOutcome::Ignored),
        }
    }

    /// Submit an answer to the current question and apply the verdict.
    pub async fn submit_answer(&mut self, answer: &str) -> AnswerOutcome {
        let check = self
            .session
            .apply(SessionEvent::AnswerSubmitted(answer.to_string()))
            .into_iter()
            .find_map(|effect| match effect {
                SessionEffect::Validate(check) => Some(check),
                _ => None,
            });
        let Some(check) = check else {
            return AnswerOutcome::NotAsked;
        };

        let verdict = self.client.validate_answer(&check).await;
        let effects = self.session.apply(SessionEvent::Validated {
            status: verdict.status,
            feedback: verdict.feedback.clone(),
            next_question: verdict.next_question.clone(),
        });

        let mut entry = self.log.entry("answer", self.session.score());
        entry.detail = Some(verdict.status.to_string());
        entry.failed_open = verdict.failed_open;
        self.log.record(&entry);

        match verdict.status {
            ValidationStatus::Pass => AnswerOutcome::Passed {
                refunded: self.finish_unlock(effects).unwrap_or(0.0),
                feedback: verdict.feedback,
                failed_open: verdict.failed_open,
            },
            ValidationStatus::NextQuestion => AnswerOutcome::NextQuestion(
                self.current_question().unwrap_or_default().to_string(),
            ),
            ValidationStatus::Fail => AnswerOutcome::Retry(verdict.feedback),
        }
    }

    /// Ask the mentor about lines `selection` (or the whole file).
    ///
    /// Not available while locked: the only way out is the quiz or undo.
    pub async fn trigger_mentor(
        &mut self,
        query: &str,
        selection: Option<(usize, usize)>,
        sink: &mut dyn FnMut(&str),
    ) -> Result<String> {
        if self.session.is_locked() {
            anyhow::bail!("session is locked: answer the mentor or undo the paste first");
        }
        let full_file = self.editor.text().to_string();
        let selected_code = match selection {
            Some((first, last)) => {
                let (start, end) = self.line_range(first, last)?;
                full_file[start..end].to_string()
            }
            None => full_file.clone(),
        };
        let transcript = self.session.transcript();
        let history = (!transcript.is_empty()).then(|| transcript.render_history());
        let request = MentorChatRequest {
            selected_code,
            full_file,
            user_query: query.to_string(),
            context_summary: self.context_summary.clone(),
            history,
        };

        let ticket = self.streams.begin();
        let mut reply = String::new();
        self.client
            .mentor_chat(&request, ticket.token(), |chunk| {
                reply.push_str(chunk);
                sink(chunk);
            })
            .await
            .context("mentor chat failed")?;
        Ok(reply)
    }

    /// Execute the current document on the backend.
    pub async fn run(&self) -> Result<RunResult> {
        self.client
            .run_code(self.editor.text())
            .await
            .context("running code failed")
    }

    /// Grant the typing reward once the current burst has gone quiet.
    pub fn poll_rewards(&mut self, now: Instant) -> bool {
        if self.session.is_locked() || !self.debounce.poll(now) {
            return false;
        }
        self.session.apply(SessionEvent::TypingReward);
        self.persist();
        true
    }

    /// Clear the lock, quiz and transcript and restore the session's
    /// starting score. The document is left as it is.
    pub fn reset(&mut self) {
        self.streams.cancel();
        self.escape.disarm();
        self.session.apply(SessionEvent::Reset);
        self.guard.resync(self.editor.version_id());
        self.debounce.baseline(self.editor.len());
        self.persist();
        self.log.record(&self.log.entry("reset", self.session.score()));
        info!("Session reset");
    }

    fn after_edit(&mut self, now: Instant) {
        self.guard
            .observe_change(self.editor.version_id(), self.session.is_locked());
        self.debounce.observe(self.editor.len(), now);
    }

    fn finish_unlock(&mut self, effects: Vec<SessionEffect>) -> Option<f64> {
        let (reason, refunded) = effects.into_iter().find_map(|effect| match effect {
            SessionEffect::Unlocked { reason, refunded } => Some((reason, refunded)),
            _ => None,
        })?;
        self.escape.disarm();
        self.streams.cancel();
        self.guard.resync(self.editor.version_id());
        self.debounce.baseline(self.editor.len());
        self.persist();

        let mut entry = self.log.entry("unlocked", self.session.score());
        entry.refunded = Some(refunded);
        entry.detail = Some(unlock_label(reason).to_string());
        self.log.record(&entry);
        Some(refunded)
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(self.session.score()) {
            warn!("Could not save score: {}", e);
        }
    }

    fn line_range(&self, first: usize, last: usize) -> Result<(usize, usize)> {
        line_span(self.editor.text(), first, last)
            .with_context(|| format!("no lines {}:{} in the document", first, last))
    }
}

fn unlock_label(reason: UnlockReason) -> &'static str {
    match reason {
        UnlockReason::UndoReverted => "undo_reverted",
        UnlockReason::QuizPassed => "quiz_passed",
        UnlockReason::Reset => "reset",
    }
}

/// Byte range of lines `first..=last` (1-based), without the final newline.
pub fn line_span(text: &str, first: usize, last: usize) -> Option<(usize, usize)> {
    if first == 0 || last < first {
        return None;
    }
    let mut starts = vec![0];
    starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
    let start = *starts.get(first - 1)?;
    let end = match starts.get(last) {
        Some(next) => next - 1,
        None if last == starts.len() => text.len(),
        None => return None,
    };
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_span() {
        let text = "a\nbb\nccc\nd";
        assert_eq!(line_span(text, 2, 3).map(|(s, e)| &text[s..e]), Some("bb\nccc"));
        assert_eq!(line_span(text, 4, 4).map(|(s, e)| &text[s..e]), Some("d"));
        assert_eq!(line_span(text, 1, 4).map(|(s, e)| &text[s..e]), Some(text));
        assert_eq!(line_span(text, 0, 1), None);
        assert_eq!(line_span(text, 3, 2), None);
        assert_eq!(line_span(text, 2, 5), None);
    }

    #[test]
    fn test_unlock_labels_match_wire_names() {
        for reason in [
            UnlockReason::UndoReverted,
            UnlockReason::QuizPassed,
            UnlockReason::Reset,
        ] {
            let wire = serde_json::to_string(&reason).unwrap();
            assert_eq!(wire, format!("\"{}\"", unlock_label(reason)));
        }
    }
}
