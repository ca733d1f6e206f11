//! Terminal output: transcript turns, lock banners, score.

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Serialize;
use socratic_common::RunResult;
use socratic_shared::{ChatTranscript, Role};
use std::io::{self, IsTerminal, Write};
use std::time::Duration;

const SPINNER_TICK_MS: u64 = 120;

pub fn role_label(role: Role) -> String {
    match role {
        Role::Mentor => "mentor:".bright_magenta().bold().to_string(),
        Role::User => "you:".bright_cyan().bold().to_string(),
    }
}

pub fn print_turn(role: Role, text: &str) {
    println!("{} {}", role_label(role), text);
}

pub fn print_transcript(transcript: &ChatTranscript) {
    for turn in transcript.turns() {
        print_turn(turn.role, &turn.text);
    }
}

/// Streamed text goes out unbuffered as it arrives.
pub fn print_chunk(chunk: &str) {
    print!("{}", chunk);
    let _ = io::stdout().flush();
}

pub fn score_text(score: f64) -> String {
    let text = format!("{:.1}", score);
    if score < 0.0 {
        text.bright_red().to_string()
    } else {
        text.bright_green().to_string()
    }
}

pub fn print_locked(line_count: usize, penalty: f64, score: f64) {
    println!(
        "{} {} pasted lines, -{:.1} (score {})",
        "[LOCKED]".bright_red().bold(),
        line_count,
        penalty,
        score_text(score)
    );
    println!(
        "{}",
        "Answer the mentor, or undo the paste (key ctrl+z) to unlock.".dimmed()
    );
}

pub fn print_unlocked(refunded: f64, score: f64) {
    println!(
        "{} +{:.1} refunded (score {})",
        "[UNLOCKED]".bright_green().bold(),
        refunded,
        score_text(score)
    );
}

pub fn print_run_result(result: &RunResult) {
    if !result.stdout.is_empty() {
        print!("{}", result.stdout);
        if !result.stdout.ends_with('\n') {
            println!();
        }
    }
    if !result.stderr.is_empty() {
        eprint!("{}", result.stderr.red());
        if !result.stderr.ends_with('\n') {
            eprintln!();
        }
    }
    if result.stdout.is_empty() && result.stderr.is_empty() {
        println!("{}", "(no output)".dimmed());
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Document with 1-based line numbers.
pub fn numbered(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let width = lines.len().to_string().len();
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$} | {}", i + 1, line, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Spinner shown while waiting on the mentor; hidden when stdout is not a
/// terminal.
pub fn thinking_spinner(message: &str) -> ProgressBar {
    if !io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.magenta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_pads_to_widest() {
        let text = (1..=10).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let out = numbered(&text);
        assert!(out.starts_with(" 1 | 1\n 2 | 2"));
        assert!(out.ends_with("10 | 10"));
    }

    #[test]
    fn test_numbered_single_line() {
        assert_eq!(numbered("x = 1"), "1 | x = 1");
    }
}
