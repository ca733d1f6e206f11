//! Mentor backend client.
//!
//! Endpoints used:
//! - POST /analyze_paste - first quiz question about a pasted snippet (SSE)
//! - POST /analyze_error - explanation of a runtime error (SSE)
//! - POST /mentor_chat - free-form question about selected code (SSE)
//! - POST /validate_answer - verdict on a quiz answer (JSON)
//! - POST /api/run - remote code execution (JSON)
//!
//! With `use_mock` set, /mock_stream and /mock_validate replace the first
//! question and validation endpoints.

use crate::config::SocraticConfig;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use socratic_shared::session::AnswerCheck;
use socratic_shared::{SseDecoder, SseFrame, ValidationStatus};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Feedback reported when validation fails open
pub const FAIL_OPEN_FEEDBACK: &str = "Mentor disconnected. Auto-passing verification.";

const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Errors from mentor requests
#[derive(Debug, thiserror::Error)]
pub enum MentorError {
    /// Cancelled through the stream's token
    #[error("Timeout")]
    Aborted,

    #[error("Backend connection failed: {0}")]
    Connect(String),

    #[error("Backend connection failed: HTTP {0}")]
    Status(u16),

    #[error("Stream read failed: {0}")]
    Body(String),

    /// No bytes arrived within the idle budget
    #[error("Stream stalled: nothing received for {0:?}")]
    Stalled(Duration),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Client setup failed: {0}")]
    Client(String),
}

impl MentorError {
    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_decode() {
            MentorError::Decode(e.to_string())
        } else if e.is_connect() || e.is_timeout() || e.is_request() {
            MentorError::Connect(e.to_string())
        } else {
            MentorError::Body(e.to_string())
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, MentorError::Aborted)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzePasteRequest {
    pub code_snippet: String,
    pub context_summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeErrorRequest {
    pub error_message: String,
    pub line_code: String,
    pub context_summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MentorChatRequest {
    pub selected_code: String,
    pub full_file: String,
    pub user_query: String,
    pub context_summary: String,
    pub history: Option<String>,
}

/// Response from /validate_answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub status: ValidationStatus,
    pub feedback: String,
    #[serde(default)]
    pub next_question: Option<String>,
    /// Set when this verdict was synthesized because the backend failed
    #[serde(skip)]
    pub failed_open: bool,
}

impl ValidateResponse {
    pub fn fail_open() -> Self {
        Self {
            status: ValidationStatus::Pass,
            feedback: FAIL_OPEN_FEEDBACK.to_string(),
            next_question: None,
            failed_open: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct RunRequest<'a> {
    code: &'a str,
}

/// Response from /api/run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct MentorClient {
    http: reqwest::Client,
    base_url: String,
    use_mock: bool,
    validate_timeout: Duration,
    stream_idle_timeout: Duration,
}

impl MentorClient {
    pub fn new(base_url: &str) -> Result<Self, MentorError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| MentorError::Client(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            use_mock: false,
            validate_timeout: Duration::from_secs(socratic_shared::VALIDATE_TIMEOUT_SECS),
            stream_idle_timeout: Duration::from_secs(socratic_shared::STREAM_IDLE_TIMEOUT_SECS),
        })
    }

    pub fn from_config(config: &SocraticConfig) -> Result<Self, MentorError> {
        Ok(Self::new(&config.endpoint)?
            .with_mock(config.use_mock)
            .with_validate_timeout(config.validate_timeout())
            .with_stream_idle_timeout(config.stream_idle_timeout()))
    }

    pub fn with_mock(mut self, use_mock: bool) -> Self {
        self.use_mock = use_mock;
        self
    }

    pub fn with_validate_timeout(mut self, timeout: Duration) -> Self {
        self.validate_timeout = timeout;
        self
    }

    /// Longest gap allowed between two reads of a streamed body.
    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Stream the first quiz question about a pasted snippet.
    pub async fn analyze_paste<F: FnMut(&str)>(
        &self,
        code_snippet: &str,
        context_summary: &str,
        cancel: &CancellationToken,
        on_chunk: F,
    ) -> Result<(), MentorError> {
        let path = if self.use_mock {
            "/mock_stream"
        } else {
            "/analyze_paste"
        };
        let body = AnalyzePasteRequest {
            code_snippet: code_snippet.to_string(),
            context_summary: context_summary.to_string(),
        };
        self.stream(path, &body, cancel, on_chunk).await
    }

    pub async fn analyze_error<F: FnMut(&str)>(
        &self,
        request: &AnalyzeErrorRequest,
        cancel: &CancellationToken,
        on_chunk: F,
    ) -> Result<(), MentorError> {
        self.stream("/analyze_error", request, cancel, on_chunk).await
    }

    pub async fn mentor_chat<F: FnMut(&str)>(
        &self,
        request: &MentorChatRequest,
        cancel: &CancellationToken,
        on_chunk: F,
    ) -> Result<(), MentorError> {
        self.stream("/mentor_chat", request, cancel, on_chunk).await
    }

    /// POST `body` to `path` and feed each SSE payload to `on_chunk`.
    ///
    /// Returns once the sentinel arrives or the body ends. Cancelling the
    /// token at any point yields `MentorError::Aborted`; a body that goes
    /// quiet for longer than the idle timeout yields `MentorError::Stalled`.
    pub async fn stream<B, F>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
        mut on_chunk: F,
    ) -> Result<(), MentorError>
    where
        B: Serialize + ?Sized,
        F: FnMut(&str),
    {
        let url = self.url(path);
        debug!("Streaming from {}", url);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(MentorError::Aborted),
            sent = self.http.post(&url).json(body).send() => {
                sent.map_err(MentorError::from_transport)?
            }
        };
        if !response.status().is_success() {
            return Err(MentorError::Status(response.status().as_u16()));
        }

        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(MentorError::Aborted),
                next = tokio::time::timeout(self.stream_idle_timeout, bytes.next()) => {
                    next.map_err(|_| MentorError::Stalled(self.stream_idle_timeout))?
                }
            };
            let frames = match next {
                Some(Ok(chunk)) => decoder.push(&chunk),
                Some(Err(e)) => return Err(MentorError::Body(e.to_string())),
                None => decoder.finish(),
            };
            for frame in frames {
                match frame {
                    SseFrame::Data(text) => on_chunk(&text),
                    SseFrame::Done => return Ok(()),
                }
            }
        }
    }

    /// One validation round, without the fail-open policy.
    pub async fn try_validate(&self, check: &AnswerCheck) -> Result<ValidateResponse, MentorError> {
        let path = if self.use_mock {
            "/mock_validate"
        } else {
            "/validate_answer"
        };
        let response = self
            .http
            .post(self.url(path))
            .json(check)
            .send()
            .await
            .map_err(MentorError::from_transport)?;
        if !response.status().is_success() {
            return Err(MentorError::Status(response.status().as_u16()));
        }
        response
            .json::<ValidateResponse>()
            .await
            .map_err(|e| MentorError::Decode(e.to_string()))
    }

    /// Validate an answer within the configured budget.
    ///
    /// Fails open: a timeout or any request failure reports a pass, so a
    /// broken backend can never leave the session locked.
    pub async fn validate_answer(&self, check: &AnswerCheck) -> ValidateResponse {
        match tokio::time::timeout(self.validate_timeout, self.try_validate(check)).await {
            Ok(Ok(verdict)) => {
                info!(
                    "Answer {} judged {}",
                    check.question_number, verdict.status
                );
                verdict
            }
            Ok(Err(e)) => {
                warn!("Validation failed ({}), auto-passing", e);
                ValidateResponse::fail_open()
            }
            Err(_) => {
                warn!(
                    "Validation timed out after {:?}, auto-passing",
                    self.validate_timeout
                );
                ValidateResponse::fail_open()
            }
        }
    }

    /// Execute `code` on the backend.
    pub async fn run_code(&self, code: &str) -> Result<RunResult, MentorError> {
        let response = self
            .http
            .post(self.url("/api/run"))
            .json(&RunRequest { code })
            .send()
            .await
            .map_err(MentorError::from_transport)?;
        if !response.status().is_success() {
            return Err(MentorError::Status(response.status().as_u16()));
        }
        response
            .json::<RunResult>()
            .await
            .map_err(|e| MentorError::Decode(e.to_string()))
    }
}
