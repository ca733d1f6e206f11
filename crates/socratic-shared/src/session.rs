//! Session reducer: lock state, quiz progress, score and transcript.
//!
//! All state transitions go through `Session::apply`, which returns the side
//! effects the owner has to perform (start a mentor stream, validate an
//! answer, log an unlock). The reducer never does I/O itself.
//!
//! # Phases
//!
//! | Phase              | Locked | Leaves on                               |
//! |--------------------|--------|-----------------------------------------|
//! | `Idle`             | no     | qualifying paste                        |
//! | `AwaitingQuestion` | yes    | question streamed (or failed), undo     |
//! | `Answering { n }`  | yes    | answer submitted, undo                  |
//! | `Evaluating { n }` | yes    | validation result, undo                 |
//! | `Passed`           | no     | qualifying paste, reset                 |

use crate::paste_guard::PasteEvent;
use crate::score::{BuilderScore, Penalty, ScoreRates};
use crate::transcript::{ChatTranscript, Role};
use crate::version::EditorVersionId;
use crate::QUIZ_QUESTIONS;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Asked when the mentor backend could not produce the first question
pub const FALLBACK_QUESTION: &str = "The mentor is unavailable. In your own words: what does the code you just pasted do, and what could go wrong with it?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Unlocked,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum QuizPhase {
    Idle,
    AwaitingQuestion,
    Answering { question_number: u8 },
    Evaluating { question_number: u8 },
    Passed,
}

impl QuizPhase {
    pub fn lock_state(&self) -> LockState {
        match self {
            Self::Idle | Self::Passed => LockState::Unlocked,
            _ => LockState::Locked,
        }
    }
}

/// Verdict of the mentor on a submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    NextQuestion,
    Pass,
    Fail,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NextQuestion => write!(f, "next_question"),
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Body of a validation request, in the backend's field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerCheck {
    pub question: String,
    pub user_answer: String,
    pub code_snippet: String,
    pub question_number: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_1: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockReason {
    UndoReverted,
    QuizPassed,
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PasteDetected(PasteEvent),
    MentorChunk(String),
    QuestionReady,
    QuestionFailed(String),
    AnswerSubmitted(String),
    Validated {
        status: ValidationStatus,
        feedback: String,
        next_question: Option<String>,
    },
    UndoReverted,
    TypingReward,
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    Locked {
        line_count: usize,
        penalty: f64,
    },
    /// Start streaming the first question about this snippet
    RequestQuestion { code_snippet: String },
    Validate(AnswerCheck),
    Unlocked {
        reason: UnlockReason,
        refunded: f64,
    },
    /// Event did not apply in the current phase
    Ignored { event: &'static str },
}

#[derive(Debug)]
struct ActivePaste {
    event: PasteEvent,
    penalty: Penalty,
    first_exchange: Option<(String, String)>,
    pending_answer: Option<String>,
}

#[derive(Debug)]
pub struct Session {
    phase: QuizPhase,
    score: BuilderScore,
    rates: ScoreRates,
    transcript: ChatTranscript,
    active: Option<ActivePaste>,
}

impl Session {
    pub fn new(initial_score: f64, rates: ScoreRates) -> Self {
        Self {
            phase: QuizPhase::Idle,
            score: BuilderScore::new(initial_score),
            rates,
            transcript: ChatTranscript::new(),
            active: None,
        }
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn lock_state(&self) -> LockState {
        self.phase.lock_state()
    }

    pub fn is_locked(&self) -> bool {
        self.lock_state() == LockState::Locked
    }

    pub fn score(&self) -> f64 {
        self.score.value()
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    pub fn active_paste(&self) -> Option<&PasteEvent> {
        self.active.as_ref().map(|a| &a.event)
    }

    pub fn pre_paste_version(&self) -> Option<EditorVersionId> {
        self.active_paste().map(|e| e.pre_paste_version)
    }

    /// Penalty currently held against the score, if locked.
    pub fn outstanding_penalty(&self) -> Option<f64> {
        self.active.as_ref().map(|a| a.penalty.amount())
    }

    pub fn apply(&mut self, event: SessionEvent) -> Vec<SessionEffect> {
        match event {
            SessionEvent::PasteDetected(paste) => self.on_paste(paste),
            SessionEvent::MentorChunk(chunk) => self.on_chunk(&chunk),
            SessionEvent::QuestionReady => self.on_question_ready(),
            SessionEvent::QuestionFailed(reason) => self.on_question_failed(&reason),
            SessionEvent::AnswerSubmitted(answer) => self.on_answer(answer),
            SessionEvent::Validated {
                status,
                feedback,
                next_question,
            } => self.on_validated(status, feedback, next_question),
            SessionEvent::UndoReverted => self.on_undo_reverted(),
            SessionEvent::TypingReward => {
                self.score.reward(self.rates.typing_reward);
                Vec::new()
            }
            SessionEvent::Reset => self.on_reset(),
        }
    }

    fn on_paste(&mut self, paste: PasteEvent) -> Vec<SessionEffect> {
        if self.is_locked() {
            return vec![SessionEffect::Ignored {
                event: "paste_detected",
            }];
        }

        let penalty = self
            .score
            .apply_penalty(paste.line_count, self.rates.penalty_per_line);
        let amount = penalty.amount();
        info!(
            "Bulk paste of {} lines, locking (penalty {:.1})",
            paste.line_count, amount
        );

        let effects = vec![
            SessionEffect::Locked {
                line_count: paste.line_count,
                penalty: amount,
            },
            SessionEffect::RequestQuestion {
                code_snippet: paste.pasted_text.clone(),
            },
        ];

        self.transcript.clear();
        self.active = Some(ActivePaste {
            event: paste,
            penalty,
            first_exchange: None,
            pending_answer: None,
        });
        self.phase = QuizPhase::AwaitingQuestion;
        effects
    }

    fn on_chunk(&mut self, chunk: &str) -> Vec<SessionEffect> {
        if self.phase != QuizPhase::AwaitingQuestion {
            return vec![SessionEffect::Ignored {
                event: "mentor_chunk",
            }];
        }
        self.transcript.append_chunk(chunk);
        Vec::new()
    }

    fn on_question_ready(&mut self) -> Vec<SessionEffect> {
        if self.phase != QuizPhase::AwaitingQuestion {
            return vec![SessionEffect::Ignored {
                event: "question_ready",
            }];
        }
        if self.transcript.finish_stream().is_none() {
            // Stream completed without a single token
            self.transcript.push(Role::Mentor, FALLBACK_QUESTION);
        }
        self.phase = QuizPhase::Answering { question_number: 1 };
        Vec::new()
    }

    fn on_question_failed(&mut self, reason: &str) -> Vec<SessionEffect> {
        if self.phase != QuizPhase::AwaitingQuestion {
            return vec![SessionEffect::Ignored {
                event: "question_failed",
            }];
        }
        debug!("First question unavailable: {}", reason);
        self.transcript.clear();
        self.transcript.push(Role::Mentor, FALLBACK_QUESTION);
        self.phase = QuizPhase::Answering { question_number: 1 };
        Vec::new()
    }

    fn on_answer(&mut self, answer: String) -> Vec<SessionEffect> {
        let QuizPhase::Answering { question_number } = self.phase else {
            return vec![SessionEffect::Ignored {
                event: "answer_submitted",
            }];
        };
        let Some(active) = self.active.as_mut() else {
            return vec![SessionEffect::Ignored {
                event: "answer_submitted",
            }];
        };

        let question = self
            .transcript
            .last_mentor()
            .map(|t| t.text.clone())
            .unwrap_or_default();
        self.transcript.push(Role::User, answer.clone());
        active.pending_answer = Some(answer.clone());

        let (question_1, answer_1) = match &active.first_exchange {
            Some((q, a)) => (Some(q.clone()), Some(a.clone())),
            None => (None, None),
        };

        self.phase = QuizPhase::Evaluating { question_number };
        vec![SessionEffect::Validate(AnswerCheck {
            question,
            user_answer: answer,
            code_snippet: active.event.pasted_text.clone(),
            question_number,
            question_1,
            answer_1,
        })]
    }

    fn on_validated(
        &mut self,
        status: ValidationStatus,
        feedback: String,
        next_question: Option<String>,
    ) -> Vec<SessionEffect> {
        let QuizPhase::Evaluating { question_number } = self.phase else {
            return vec![SessionEffect::Ignored { event: "validated" }];
        };

        match status {
            ValidationStatus::NextQuestion => {
                if let Some(active) = self.active.as_mut() {
                    if active.first_exchange.is_none() {
                        let question = self
                            .transcript
                            .last_mentor()
                            .map(|t| t.text.clone())
                            .unwrap_or_default();
                        let answer = active.pending_answer.take().unwrap_or_default();
                        active.first_exchange = Some((question, answer));
                    }
                }
                let text = next_question.unwrap_or(feedback);
                self.transcript.push(Role::Mentor, text);
                // The backend never sees a question number past the last one
                self.phase = QuizPhase::Answering {
                    question_number: question_number.saturating_add(1).min(QUIZ_QUESTIONS),
                };
                Vec::new()
            }
            ValidationStatus::Pass => {
                let refunded = self.release_penalty();
                info!("Quiz passed, unlocking (refund {:.1})", refunded);
                self.transcript.clear();
                self.transcript.push(Role::Mentor, feedback);
                self.phase = QuizPhase::Passed;
                vec![SessionEffect::Unlocked {
                    reason: UnlockReason::QuizPassed,
                    refunded,
                }]
            }
            ValidationStatus::Fail => {
                self.transcript.push(Role::Mentor, feedback);
                self.phase = QuizPhase::Answering { question_number };
                Vec::new()
            }
        }
    }

    fn on_undo_reverted(&mut self) -> Vec<SessionEffect> {
        if !self.is_locked() {
            return vec![SessionEffect::Ignored {
                event: "undo_reverted",
            }];
        }
        let refunded = self.release_penalty();
        info!("Paste undone, unlocking (refund {:.1})", refunded);
        self.transcript.clear();
        self.phase = QuizPhase::Idle;
        vec![SessionEffect::Unlocked {
            reason: UnlockReason::UndoReverted,
            refunded,
        }]
    }

    fn on_reset(&mut self) -> Vec<SessionEffect> {
        let was_locked = self.is_locked();
        self.active = None;
        self.score.reset();
        self.transcript.clear();
        self.phase = QuizPhase::Idle;
        if was_locked {
            vec![SessionEffect::Unlocked {
                reason: UnlockReason::Reset,
                refunded: 0.0,
            }]
        } else {
            Vec::new()
        }
    }

    /// Refund and forget the stored penalty. Returns the amount refunded.
    fn release_penalty(&mut self) -> f64 {
        match self.active.take() {
            Some(active) => {
                let amount = active.penalty.amount();
                self.score.refund(active.penalty);
                amount
            }
            None => 0.0,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(0.0, ScoreRates::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paste(lines: usize) -> PasteEvent {
        PasteEvent {
            pasted_text: vec!["x = 1"; lines].join("\n"),
            line_count: lines,
            pre_paste_version: EditorVersionId(3),
        }
    }

    #[test]
    fn test_phase_lock_state() {
        assert_eq!(QuizPhase::Idle.lock_state(), LockState::Unlocked);
        assert_eq!(QuizPhase::Passed.lock_state(), LockState::Unlocked);
        assert_eq!(
            QuizPhase::Evaluating { question_number: 2 }.lock_state(),
            LockState::Locked
        );
    }

    #[test]
    fn test_second_paste_while_locked_ignored() {
        let mut s = Session::default();
        s.apply(SessionEvent::PasteDetected(paste(30)));
        let effects = s.apply(SessionEvent::PasteDetected(paste(50)));
        assert_eq!(
            effects,
            vec![SessionEffect::Ignored {
                event: "paste_detected"
            }]
        );
        assert_eq!(s.score(), -6.0);
    }

    #[test]
    fn test_chunks_outside_awaiting_ignored() {
        let mut s = Session::default();
        let effects = s.apply(SessionEvent::MentorChunk("late".into()));
        assert!(matches!(effects[0], SessionEffect::Ignored { .. }));
        assert!(s.transcript().is_empty());
    }

    #[test]
    fn test_question_failure_falls_back() {
        let mut s = Session::default();
        s.apply(SessionEvent::PasteDetected(paste(30)));
        s.apply(SessionEvent::MentorChunk("partial".into()));
        s.apply(SessionEvent::QuestionFailed("Backend connection failed".into()));
        assert_eq!(s.phase(), QuizPhase::Answering { question_number: 1 });
        assert_eq!(s.transcript().len(), 1);
        assert_eq!(s.transcript().last().unwrap().text, FALLBACK_QUESTION);
    }

    #[test]
    fn test_validation_result_after_undo_ignored() {
        let mut s = Session::default();
        s.apply(SessionEvent::PasteDetected(paste(30)));
        s.apply(SessionEvent::MentorChunk("Q1".into()));
        s.apply(SessionEvent::QuestionReady);
        s.apply(SessionEvent::AnswerSubmitted("A1".into()));
        s.apply(SessionEvent::UndoReverted);
        let effects = s.apply(SessionEvent::Validated {
            status: ValidationStatus::Pass,
            feedback: "ok".into(),
            next_question: None,
        });
        assert_eq!(effects, vec![SessionEffect::Ignored { event: "validated" }]);
        assert_eq!(s.score(), 0.0);
    }

    #[test]
    fn test_reset_restores_initial_score() {
        let mut s = Session::new(4.2, ScoreRates::default());
        s.apply(SessionEvent::PasteDetected(paste(46)));
        let effects = s.apply(SessionEvent::Reset);
        assert!(matches!(
            effects[0],
            SessionEffect::Unlocked {
                reason: UnlockReason::Reset,
                ..
            }
        ));
        assert_eq!(s.score(), 4.2);
        assert_eq!(s.phase(), QuizPhase::Idle);
    }

    #[test]
    fn test_validation_status_wire_names() {
        let s: ValidationStatus = serde_json::from_str("\"next_question\"").unwrap();
        assert_eq!(s, ValidationStatus::NextQuestion);
        assert_eq!(serde_json::to_string(&ValidationStatus::Pass).unwrap(), "\"pass\"");
    }
}
