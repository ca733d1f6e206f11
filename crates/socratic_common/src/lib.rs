//! Socratic Common - async plumbing shared by the Socratic front-ends.
//!
//! Configuration, the mentor backend client and stream cancellation.

pub mod config;
pub mod mentor;
pub mod stream_session;
pub mod workspace;

pub use config::SocraticConfig;
pub use mentor::{
    AnalyzeErrorRequest, MentorChatRequest, MentorClient, MentorError, RunResult,
    ValidateResponse, FAIL_OPEN_FEEDBACK,
};
pub use stream_session::{StreamSessions, StreamTicket};
pub use workspace::{scan_workspace, WorkspaceFiles};
