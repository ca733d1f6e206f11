//! Chat transcript between the mentor and the user.
//!
//! Append-only while a session is locked; cleared on unlock or reset.

use serde::{Deserialize, Serialize};

/// Who is speaking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Mentor, // Questions and feedback
    User,   // Answers
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mentor => write!(f, "mentor"),
            Self::User => write!(f, "you"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatTranscript {
    turns: Vec<Turn>,
    /// The last mentor turn is still receiving stream chunks
    #[serde(skip)]
    streaming: bool,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.streaming = false;
        self.turns.push(Turn {
            role,
            text: text.into(),
        });
    }

    /// Append a streamed fragment to the open mentor turn, opening one if needed.
    pub fn append_chunk(&mut self, chunk: &str) {
        match self.turns.last_mut() {
            Some(turn) if self.streaming && turn.role == Role::Mentor => turn.text.push_str(chunk),
            _ => {
                self.turns.push(Turn {
                    role: Role::Mentor,
                    text: chunk.to_string(),
                });
                self.streaming = true;
            }
        }
    }

    /// Close the streamed turn. Returns its text, if one was open.
    pub fn finish_stream(&mut self) -> Option<&str> {
        if !self.streaming {
            return None;
        }
        self.streaming = false;
        self.turns.last().map(|t| t.text.as_str())
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.streaming = false;
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Most recent mentor turn, i.e. the question being answered.
    pub fn last_mentor(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == Role::Mentor)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Plain-text rendering used as chat history for the mentor.
    pub fn render_history(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.role, t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
