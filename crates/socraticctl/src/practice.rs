//! Interactive practice session.
//!
//! Line-driven stand-in for an editor: each input line is one command
//! (typing, pasting, key chords, answers) applied through the controller.

use crate::controller::{AnswerOutcome, Controller, InputOutcome, StreamEvent, StreamUpdate};
use crate::logging::SessionLog;
use crate::output;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use socratic_common::SocraticConfig;
use socratic_shared::{KeyStroke, Role, TextEditor};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Query used when the mentor chord is pressed
const DEFAULT_MENTOR_QUERY: &str = "What should I understand about this code?";

/// Snippet pasted by `paste` with no file: a 46-line login module
const DEMO_SNIPPET_LINES: &[&str] = &[
    "import hashlib",
    "import sqlite3",
    "import threading",
    "",
    "_lock = threading.Lock()",
    "",
    "",
    "def get_connection(path=\"users.db\"):",
    "    conn = sqlite3.connect(path, check_same_thread=False)",
    "    conn.execute(",
    "        \"CREATE TABLE IF NOT EXISTS users (name TEXT PRIMARY KEY, hash TEXT)\"",
    "    )",
    "    return conn",
    "",
    "",
    "def hash_password(password):",
    "    return hashlib.sha256(password.encode()).hexdigest()",
    "",
    "",
    "def register(conn, name, password):",
    "    with _lock:",
    "        conn.execute(",
    "            \"INSERT INTO users VALUES ('%s', '%s')\" % (name, hash_password(password))",
    "        )",
    "        conn.commit()",
    "",
    "",
    "def login(conn, name, password):",
    "    row = conn.execute(",
    "        \"SELECT hash FROM users WHERE name = '%s'\" % name",
    "    ).fetchone()",
    "    if row is None:",
    "        return False",
    "    return row[0] == hash_password(password)",
    "",
    "",
    "def change_password(conn, name, old, new):",
    "    if not login(conn, name, old):",
    "        raise PermissionError(\"wrong password\")",
    "    with _lock:",
    "        conn.execute(",
    "            \"UPDATE users SET hash = ? WHERE name = ?\",",
    "            (hash_password(new), name),",
    "        )",
    "        conn.commit()",
    "    return True",
];

const HELP: &str = "\
commands:
  type <text>        type text at the end of the document (\\n and \\t escapes)
  paste [file]       paste a file, or the built-in 46-line snippet
  copy <a:b>         copy lines a..b to the internal clipboard
  cut <a:b>          cut lines a..b to the internal clipboard
  key <chord>        press a key, e.g. ctrl+z, cmd+shift+z, backspace, ctrl+m
  answer <text>      answer the mentor's question
  ask <question>     ask the mentor about the document (same as ctrl+m)
  run                execute the document on the backend
  show               print document, lock state, score and flow
  reset              clear lock and quiz, restore the starting score
  quit               leave";

pub fn demo_snippet() -> String {
    DEMO_SNIPPET_LINES.join("\n")
}

#[derive(Debug, Clone, PartialEq)]
pub enum PracticeCommand {
    Type(String),
    Paste(Option<PathBuf>),
    Copy(usize, usize),
    Cut(usize, usize),
    Key(KeyStroke),
    Answer(String),
    Ask(String),
    Run,
    Show,
    Reset,
    Help,
    Quit,
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn required<'a>(rest: &'a str, what: &str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("missing {}", what))
    } else {
        Ok(rest)
    }
}

/// Parse one input line. `Ok(None)` for blank lines.
pub fn parse_command(line: &str) -> Result<Option<PracticeCommand>, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.trim_start().split_once(' ') {
        Some((w, r)) => (w, r),
        None => (line.trim(), ""),
    };

    let command = match word {
        // Typed text keeps its spacing
        "type" => PracticeCommand::Type(unescape(required(rest, "text")?)),
        "paste" => {
            let rest = rest.trim();
            PracticeCommand::Paste((!rest.is_empty()).then(|| PathBuf::from(rest)))
        }
        "copy" | "cut" => {
            let (first, last) = crate::cli::parse_line_range(required(rest.trim(), "line range")?)?;
            if word == "copy" {
                PracticeCommand::Copy(first, last)
            } else {
                PracticeCommand::Cut(first, last)
            }
        }
        "key" => PracticeCommand::Key(required(rest.trim(), "key chord")?.parse()?),
        "answer" => PracticeCommand::Answer(required(rest.trim(), "answer")?.to_string()),
        "ask" => PracticeCommand::Ask(required(rest.trim(), "question")?.to_string()),
        "run" => PracticeCommand::Run,
        "show" => PracticeCommand::Show,
        "reset" => PracticeCommand::Reset,
        "help" | "?" => PracticeCommand::Help,
        "quit" | "exit" => PracticeCommand::Quit,
        other => return Err(format!("unknown command '{}' (try 'help')", other)),
    };
    Ok(Some(command))
}

pub async fn run(config: &SocraticConfig, file: Option<&Path>) -> Result<()> {
    let initial = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => String::new(),
    };
    let summary = file
        .map(|p| format!("Editing {}", p.display()))
        .unwrap_or_default();
    let mut controller =
        Controller::new(config, &initial, SessionLog::discover())?.with_context_summary(summary);

    println!(
        "{} score {} | endpoint {} | type 'help' for commands",
        "socratic practice".bold(),
        output::score_text(controller.score()),
        config.endpoint
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut mentor_line_open = false;
    let mut needs_prompt = true;
    loop {
        if needs_prompt && !mentor_line_open {
            print_prompt(&controller);
            needs_prompt = false;
        }
        // The question stream is polled alongside stdin so undo and reset
        // work while it is still arriving
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line?),
            Some(event) = controller.next_stream_event() => Input::Stream(event),
        };
        let line = match input {
            Input::Stream(event) => {
                match controller.apply_stream_event(event) {
                    StreamUpdate::Stale => {}
                    StreamUpdate::Chunk(text) => {
                        if !mentor_line_open {
                            print!("\n{} ", output::role_label(Role::Mentor));
                            mentor_line_open = true;
                        }
                        output::print_chunk(&text);
                    }
                    StreamUpdate::QuestionReady(_) => {
                        println!();
                        mentor_line_open = false;
                        needs_prompt = true;
                    }
                    StreamUpdate::Fallback(question) => {
                        if mentor_line_open {
                            println!();
                            mentor_line_open = false;
                        }
                        output::print_turn(Role::Mentor, &question);
                        needs_prompt = true;
                    }
                }
                continue;
            }
            Input::Line(None) => break,
            Input::Line(Some(line)) => line,
        };
        if mentor_line_open {
            println!();
            mentor_line_open = false;
        }
        needs_prompt = true;

        if controller.poll_rewards(Instant::now()) {
            println!(
                "{} +{:.1} typing reward",
                "[SCORE]".bright_green(),
                config.typing_reward
            );
        }

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(msg) => {
                eprintln!("{} {}", "error:".bright_red(), msg);
                continue;
            }
        };
        if command == PracticeCommand::Quit {
            break;
        }
        if let Err(e) = execute(&mut controller, command).await {
            eprintln!("{} {:#}", "error:".bright_red(), e);
        }
    }

    println!("final score {}", output::score_text(controller.score()));
    Ok(())
}

enum Input {
    Line(Option<String>),
    Stream(StreamEvent),
}

fn print_prompt(controller: &Controller) {
    let tag = if controller.is_locked() {
        "[locked]".bright_red().to_string()
    } else {
        "[editing]".bright_green().to_string()
    };
    print!("{} > ", tag);
    let _ = std::io::stdout().flush();
}

async fn execute(controller: &mut Controller, command: PracticeCommand) -> Result<()> {
    match command {
        PracticeCommand::Type(text) => {
            let outcome = controller.type_text(&text)?;
            report_input(controller, outcome);
        }
        PracticeCommand::Paste(path) => {
            let text = match path {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => demo_snippet(),
            };
            let outcome = controller.paste(&text)?;
            report_input(controller, outcome);
        }
        PracticeCommand::Copy(first, last) => {
            let outcome = controller.copy(first, last)?;
            report_input(controller, outcome);
        }
        PracticeCommand::Cut(first, last) => {
            let outcome = controller.cut(first, last)?;
            report_input(controller, outcome);
        }
        PracticeCommand::Key(key) => {
            let outcome = controller.key(&key)?;
            if outcome == InputOutcome::MentorRequested {
                ask(controller, DEFAULT_MENTOR_QUERY).await?;
            } else {
                report_input(controller, outcome);
            }
        }
        PracticeCommand::Answer(text) => {
            let spinner = output::thinking_spinner("mentor is reading your answer...");
            let outcome = controller.submit_answer(&text).await;
            spinner.finish_and_clear();
            report_answer(controller, outcome);
        }
        PracticeCommand::Ask(query) => ask(controller, &query).await?,
        PracticeCommand::Run => {
            let result = controller.run().await?;
            output::print_run_result(&result);
        }
        PracticeCommand::Show => show(controller),
        PracticeCommand::Reset => {
            controller.reset();
            println!("reset, score {}", output::score_text(controller.score()));
        }
        PracticeCommand::Help => println!("{}", HELP),
        PracticeCommand::Quit => {}
    }
    Ok(())
}

async fn ask(controller: &mut Controller, query: &str) -> Result<()> {
    print!("{} ", output::role_label(Role::Mentor));
    controller
        .trigger_mentor(query, None, &mut |chunk: &str| output::print_chunk(chunk))
        .await?;
    println!();
    Ok(())
}

fn report_input(controller: &Controller, outcome: InputOutcome) {
    match outcome {
        InputOutcome::Applied | InputOutcome::Ignored | InputOutcome::MentorRequested => {}
        InputOutcome::Suppressed => println!(
            "{}",
            "locked: only undo (ctrl+z) or an answer gets through".dimmed()
        ),
        InputOutcome::Locked {
            line_count,
            penalty,
        } => {
            output::print_locked(line_count, penalty, controller.score());
            if controller.question_pending() {
                let hint = "mentor is writing a question; 'key ctrl+z' undoes the paste";
                println!("{}", hint.dimmed());
            }
        }
        InputOutcome::UndoStep => println!("{}", "undo taken, paste not fully reverted yet".dimmed()),
        InputOutcome::Unlocked { refunded } => {
            output::print_unlocked(refunded, controller.score())
        }
    }
}

fn report_answer(controller: &Controller, outcome: AnswerOutcome) {
    match outcome {
        AnswerOutcome::NotAsked if controller.question_pending() => {
            println!("{}", "the mentor is still writing its question".dimmed())
        }
        AnswerOutcome::NotAsked => println!("{}", "no question is waiting for an answer".dimmed()),
        AnswerOutcome::NextQuestion(question) => output::print_turn(Role::Mentor, &question),
        AnswerOutcome::Retry(feedback) => {
            output::print_turn(Role::Mentor, &feedback);
            println!("{}", "try again with 'answer <text>'".dimmed());
        }
        AnswerOutcome::Passed {
            feedback,
            refunded,
            failed_open,
        } => {
            output::print_turn(Role::Mentor, &feedback);
            if failed_open {
                println!("{}", "(auto-passed: mentor unavailable)".yellow());
            }
            output::print_unlocked(refunded, controller.score());
        }
    }
}

fn show(controller: &Controller) {
    println!("{}", output::numbered(controller.text()));
    println!();
    let flow = controller.flow_state(Instant::now());
    println!(
        "{} | score {} | version {} | streak {} | {} wpm{}",
        if controller.is_locked() {
            "locked".bright_red().to_string()
        } else {
            "unlocked".bright_green().to_string()
        },
        output::score_text(controller.score()),
        controller.editor().version_id(),
        flow.streak,
        flow.wpm,
        if flow.is_flowing { " | in flow" } else { "" }
    );
    if !controller.session().transcript().is_empty() {
        println!();
        output::print_transcript(controller.session().transcript());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socratic_shared::{line_count, DEMO_PASTE_LINE_COUNT};

    #[test]
    fn test_demo_snippet_size() {
        assert_eq!(line_count(&demo_snippet()), DEMO_PASTE_LINE_COUNT);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(
            parse_command("type  x = 1\\n"),
            Ok(Some(PracticeCommand::Type(" x = 1\n".into())))
        );
        assert_eq!(parse_command("paste"), Ok(Some(PracticeCommand::Paste(None))));
        assert_eq!(
            parse_command("paste lib/db.py"),
            Ok(Some(PracticeCommand::Paste(Some(PathBuf::from("lib/db.py")))))
        );
        assert_eq!(parse_command("cut 2:4"), Ok(Some(PracticeCommand::Cut(2, 4))));
        assert_eq!(
            parse_command("key ctrl+z"),
            Ok(Some(PracticeCommand::Key("ctrl+z".parse().unwrap())))
        );
        assert_eq!(parse_command("quit"), Ok(Some(PracticeCommand::Quit)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("type").is_err());
        assert!(parse_command("copy 3").is_err());
        assert!(parse_command("key ctrl+nope+z").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a\\nb\\tc\\\\d\\q"), "a\nb\tc\\d\\q");
    }
}
