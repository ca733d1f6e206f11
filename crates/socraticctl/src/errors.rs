//! Exit codes for socraticctl

use socratic_common::MentorError;

/// Exit code for general errors
pub const EXIT_GENERAL_ERROR: i32 = 1;

/// Exit code when the backend returns a body we cannot decode
pub const EXIT_INVALID_RESPONSE: i32 = 65;

/// Exit code when an input file cannot be read
pub const EXIT_NO_INPUT: i32 = 66;

/// Exit code when the mentor backend is unreachable or refuses the request
pub const EXIT_BACKEND_UNAVAILABLE: i32 = 70;

/// Map an error chain to the process exit code.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(mentor) = cause.downcast_ref::<MentorError>() {
            return match mentor {
                MentorError::Decode(_) => EXIT_INVALID_RESPONSE,
                MentorError::Aborted => EXIT_GENERAL_ERROR,
                _ => EXIT_BACKEND_UNAVAILABLE,
            };
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return EXIT_NO_INPUT;
        }
    }
    EXIT_GENERAL_ERROR
}
