//! One-shot subcommands. `practice` hands off to the interactive loop.

use crate::cli::{Cli, Commands, ScoreCommands};
use crate::controller::line_span;
use crate::output;
use crate::practice;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde_json::json;
use socratic_common::{
    scan_workspace, AnalyzeErrorRequest, MentorChatRequest, MentorClient, MentorError,
    SocraticConfig,
};
use socratic_shared::score_store::ScoreStore;
use socratic_shared::session::AnswerCheck;
use socratic_shared::{Role, QUIZ_QUESTIONS};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = SocraticConfig::load(cli.config.as_deref());
    config.apply_endpoint_override(cli.endpoint.as_deref());
    debug!("Using mentor backend {}", config.endpoint);

    match cli.command {
        Commands::Ask { file, context } => {
            let snippet = read_file(&file)?;
            let summary = read_optional(context.as_deref())?;
            let client = MentorClient::from_config(&config)?;
            let mut printer = StreamPrinter::new(cli.json);
            let token = interrupt_token();
            let result = client
                .analyze_paste(&snippet, &summary, &token, |chunk| printer.chunk(chunk))
                .await;
            printer.finish("question", result)
        }
        Commands::Explain {
            error,
            line,
            context,
        } => {
            let request = AnalyzeErrorRequest {
                error_message: error,
                line_code: line,
                context_summary: read_optional(context.as_deref())?,
            };
            let client = MentorClient::from_config(&config)?;
            let mut printer = StreamPrinter::new(cli.json);
            let token = interrupt_token();
            let result = client
                .analyze_error(&request, &token, |chunk| printer.chunk(chunk))
                .await;
            printer.finish("explanation", result)
        }
        Commands::Chat {
            file,
            query,
            selection,
            history,
            workspace,
        } => {
            let request = chat_request(&file, query, selection, history, workspace.as_deref())?;
            let client = MentorClient::from_config(&config)?;
            let mut printer = StreamPrinter::new(cli.json);
            let token = interrupt_token();
            let result = client
                .mentor_chat(&request, &token, |chunk| printer.chunk(chunk))
                .await;
            printer.finish("reply", result)
        }
        Commands::Validate {
            question,
            answer,
            snippet,
            number,
            question_1,
            answer_1,
        } => {
            if !(1..=QUIZ_QUESTIONS).contains(&number) {
                anyhow::bail!(
                    "--number must be between 1 and {}, got {}",
                    QUIZ_QUESTIONS,
                    number
                );
            }
            let check = AnswerCheck {
                question,
                user_answer: answer,
                code_snippet: read_file(&snippet)?,
                question_number: number,
                question_1,
                answer_1,
            };
            let client = MentorClient::from_config(&config)?;
            let spinner = output::thinking_spinner("mentor is reading your answer...");
            let verdict = client.validate_answer(&check).await;
            spinner.finish_and_clear();

            if cli.json {
                output::print_json(&json!({
                    "status": verdict.status,
                    "feedback": verdict.feedback,
                    "next_question": verdict.next_question,
                    "failed_open": verdict.failed_open,
                }))?;
            } else {
                println!("{} {}", "status:".bold(), verdict.status);
                output::print_turn(Role::Mentor, &verdict.feedback);
                if let Some(next) = &verdict.next_question {
                    output::print_turn(Role::Mentor, next);
                }
                if verdict.failed_open {
                    println!("{}", "(auto-passed: mentor unavailable)".yellow());
                }
            }
            Ok(())
        }
        Commands::Run { file } => {
            let code = read_file(&file)?;
            let client = MentorClient::from_config(&config)?;
            let result = client.run_code(&code).await?;
            if cli.json {
                output::print_json(&result)?;
            } else {
                output::print_run_result(&result);
            }
            Ok(())
        }
        Commands::Score { action } => {
            let store = ScoreStore::new(&config.state_dir());
            if action == ScoreCommands::Reset {
                store.reset()?;
                info!("Score reset at {}", store.path().display());
            }
            let score = store.load();
            if cli.json {
                output::print_json(&json!({
                    "score": score,
                    "path": store.path(),
                }))?;
            } else {
                println!("builder score {}", output::score_text(score));
            }
            Ok(())
        }
        Commands::Practice { file } => practice::run(&config, file.as_deref()).await,
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_optional(path: Option<&Path>) -> Result<String> {
    path.map(read_file).transpose().map(Option::unwrap_or_default)
}

/// Token cancelled on the first ctrl-c.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

fn chat_request(
    file: &Path,
    query: String,
    selection: Option<(usize, usize)>,
    history: Option<String>,
    workspace: Option<&Path>,
) -> Result<MentorChatRequest> {
    let full_file = read_file(file)?;
    let selected_code = match selection {
        Some((first, last)) => {
            let (start, end) = line_span(&full_file, first, last)
                .with_context(|| format!("no lines {}:{} in {}", first, last, file.display()))?;
            full_file[start..end].to_string()
        }
        None => full_file.clone(),
    };
    let context_summary = match workspace {
        Some(root) => workspace_summary(root, file)?,
        None => String::new(),
    };
    Ok(MentorChatRequest {
        selected_code,
        full_file,
        user_query: query,
        context_summary,
        history: history.filter(|h| !h.trim().is_empty()),
    })
}

/// Render the related-file context of `file` inside `root`.
fn workspace_summary(root: &Path, file: &Path) -> Result<String> {
    let root = root
        .canonicalize()
        .with_context(|| format!("workspace {}", root.display()))?;
    let file: PathBuf = file
        .canonicalize()
        .with_context(|| format!("reading {}", file.display()))?;
    let relative = file
        .strip_prefix(&root)
        .with_context(|| format!("{} is outside {}", file.display(), root.display()))?;
    let active = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");

    let files = scan_workspace(&root)?;
    debug!("Scanned {} files under {}", files.tree.len(), root.display());
    Ok(files
        .context_for(&active)
        .map(|ctx| ctx.render_summary())
        .unwrap_or_default())
}

/// Prints streamed text live, or collects it for one JSON object.
struct StreamPrinter {
    json: bool,
    text: String,
    started: bool,
}

impl StreamPrinter {
    fn new(json: bool) -> Self {
        Self {
            json,
            text: String::new(),
            started: false,
        }
    }

    fn chunk(&mut self, chunk: &str) {
        self.text.push_str(chunk);
        if self.json {
            return;
        }
        if !self.started {
            print!("{} ", output::role_label(Role::Mentor));
            self.started = true;
        }
        output::print_chunk(chunk);
    }

    fn finish(self, field: &str, result: Result<(), MentorError>) -> Result<()> {
        if self.started {
            println!();
        }
        match result {
            Ok(()) => {
                if self.json {
                    output::print_json(&json!({ field: self.text }))?;
                }
                Ok(())
            }
            Err(e) if e.is_aborted() => {
                eprintln!("{}", "interrupted".yellow());
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
