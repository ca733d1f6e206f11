//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Socratic paste guard CLI
#[derive(Parser, Debug)]
#[command(name = "socraticctl")]
#[command(about = "Socratic mentor - question pasted code before you keep it", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Mentor backend URL (overrides config and $SOCRATIC_ENDPOINT)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Config file (overrides $SOCRATIC_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream the mentor's question about a code snippet
    Ask {
        /// File holding the snippet
        file: PathBuf,

        /// File whose content is sent as context summary
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Stream an explanation of an error
    Explain {
        /// Error message
        #[arg(long)]
        error: String,

        /// Source line that raised it
        #[arg(long)]
        line: String,

        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Ask the mentor about a file
    Chat {
        file: PathBuf,

        #[arg(long)]
        query: String,

        /// Lines to ask about, e.g. 3:10
        #[arg(long, value_parser = parse_line_range)]
        selection: Option<(usize, usize)>,

        /// Earlier conversation, one "role: text" per line
        #[arg(long)]
        history: Option<String>,

        /// Project root to collect related files from
        #[arg(long)]
        workspace: Option<PathBuf>,
    },

    /// Run one answer validation round
    Validate {
        #[arg(long)]
        question: String,

        #[arg(long)]
        answer: String,

        /// File holding the snippet the question is about
        #[arg(long)]
        snippet: PathBuf,

        /// Question number (1 or 2)
        #[arg(long, default_value_t = 1)]
        number: u8,

        /// First question, when validating the second answer
        #[arg(long)]
        question_1: Option<String>,

        /// Answer to the first question
        #[arg(long)]
        answer_1: Option<String>,
    },

    /// Execute a file on the backend
    Run { file: PathBuf },

    /// Persisted builder score
    Score {
        #[command(subcommand)]
        action: ScoreCommands,
    },

    /// Interactive practice session
    Practice {
        /// Initial document
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreCommands {
    Show,
    Reset,
}

/// Parse `a:b` into a 1-based inclusive line range.
pub fn parse_line_range(s: &str) -> Result<(usize, usize), String> {
    let (a, b) = s
        .split_once(':')
        .ok_or_else(|| format!("expected FIRST:LAST, got '{}'", s))?;
    let first: usize = a
        .trim()
        .parse()
        .map_err(|_| format!("invalid line number '{}'", a))?;
    let last: usize = b
        .trim()
        .parse()
        .map_err(|_| format!("invalid line number '{}'", b))?;
    if first == 0 || last < first {
        return Err(format!("invalid range {}:{}", first, last));
    }
    Ok((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_line_range() {
        assert_eq!(parse_line_range("3:10"), Ok((3, 10)));
        assert_eq!(parse_line_range("4:4"), Ok((4, 4)));
        assert!(parse_line_range("0:2").is_err());
        assert!(parse_line_range("5:2").is_err());
        assert!(parse_line_range("7").is_err());
    }

    #[test]
    fn test_validate_flags() {
        let cli = Cli::parse_from([
            "socraticctl",
            "validate",
            "--question",
            "Q2",
            "--answer",
            "A2",
            "--snippet",
            "a.py",
            "--number",
            "2",
            "--question-1",
            "Q1",
            "--answer-1",
            "A1",
            "--json",
        ]);
        assert!(cli.json);
        match cli.command {
            Commands::Validate {
                number, question_1, ..
            } => {
                assert_eq!(number, 2);
                assert_eq!(question_1.as_deref(), Some("Q1"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
