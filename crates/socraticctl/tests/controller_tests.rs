//! Practice controller tests against an in-process mentor backend.

use axum::body::Body;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use futures_util::{stream, StreamExt};
use serde_json::{json, Value};
use socratic_common::{SocraticConfig, FAIL_OPEN_FEEDBACK};
use socratic_shared::score_store::ScoreStore;
use socratic_shared::session::FALLBACK_QUESTION;
use socratic_shared::KeyStroke;
use socraticctl::controller::{AnswerOutcome, Controller, InputOutcome, StreamEvent, StreamUpdate};
use socraticctl::logging::{SessionLog, SessionLogEntry};
use std::path::Path;
use std::time::Duration;

const QUESTION: &str = "What does this loop accumulate?";

fn sse(chunks: Vec<String>) -> impl IntoResponse {
    let body = Body::from_stream(stream::iter(
        chunks.into_iter().map(Ok::<_, std::io::Error>),
    ));
    ([(header::CONTENT_TYPE, "text/event-stream")], body)
}

async fn validate_answer(Json(body): Json<Value>) -> Json<Value> {
    let answer = body["user_answer"].as_str().unwrap_or_default();
    if answer.contains("no idea") {
        return Json(json!({"status": "fail", "feedback": "Look at the loop body again."}));
    }
    if body["question_number"] == 1 {
        Json(json!({
            "status": "next_question",
            "feedback": "Right.",
            "next_question": "What happens when the list is empty?",
        }))
    } else {
        Json(json!({"status": "pass", "feedback": "Excellent analysis!"}))
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_backend() -> String {
    let app = Router::new()
        .route(
            "/analyze_paste",
            post(|| async {
                sse(vec![
                    "data: What does this loop ".to_string(),
                    "accumulate?\n\ndata: [DONE]\n\n".to_string(),
                ])
            }),
        )
        .route("/validate_answer", post(validate_answer))
        .route(
            "/mentor_chat",
            post(|Json(body): Json<Value>| async move {
                let query = body["user_query"].as_str().unwrap_or_default().to_string();
                sse(vec![format!("data: You asked: {}\n\n", query), "data: [DONE]\n\n".into()])
            }),
        );
    serve(app).await
}

/// Backend whose question stream names the first pasted line, then goes quiet.
async fn spawn_stalled_backend() -> String {
    let app = Router::new().route(
        "/analyze_paste",
        post(|Json(body): Json<Value>| async move {
            let snippet = body["code_snippet"].as_str().unwrap_or_default();
            let first = snippet.lines().next().unwrap_or_default().to_string();
            let head = stream::iter(vec![Ok::<_, std::io::Error>(format!(
                "data: About {}\n\n",
                first
            ))]);
            let body = Body::from_stream(head.chain(stream::pending()));
            ([(header::CONTENT_TYPE, "text/event-stream")], body)
        }),
    );
    serve(app).await
}

/// Endpoint nothing listens on.
async fn refused_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn config(endpoint: String, state_dir: &Path) -> SocraticConfig {
    SocraticConfig {
        endpoint,
        validate_timeout_secs: 2,
        state_dir: Some(state_dir.to_path_buf()),
        ..SocraticConfig::default()
    }
}

fn thirty_lines() -> String {
    lines_of("total")
}

fn lines_of(name: &str) -> String {
    (1..=30)
        .map(|i| format!("{} += values[{}]", name, i))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Apply stream events until the first question settles. Returns the
/// streamed text and the final update.
async fn wait_for_question(controller: &mut Controller) -> (String, StreamUpdate) {
    let mut streamed = String::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), controller.next_stream_event())
            .await
            .expect("question stream timed out")
            .expect("stream channel closed");
        match controller.apply_stream_event(event) {
            StreamUpdate::Chunk(text) => streamed.push_str(&text),
            StreamUpdate::Stale => {}
            done => return (streamed, done),
        }
    }
}

fn key(chord: &str) -> KeyStroke {
    chord.parse().unwrap()
}

fn log_entries(path: &Path) -> Vec<SessionLogEntry> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn test_paste_locks_and_undo_unlocks() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("session.jsonl");
    let config = config(spawn_backend().await, dir.path());
    let mut controller =
        Controller::new(&config, "values = []\n", SessionLog::at(&log_path)).unwrap();

    let outcome = controller.paste(&thirty_lines()).unwrap();
    assert_eq!(
        outcome,
        InputOutcome::Locked {
            line_count: 30,
            penalty: 6.0
        }
    );
    assert!(controller.question_pending());
    let (streamed, update) = wait_for_question(&mut controller).await;
    assert_eq!(streamed, QUESTION);
    assert_eq!(update, StreamUpdate::QuestionReady(QUESTION.into()));
    assert_eq!(controller.current_question(), Some(QUESTION));
    assert_eq!(controller.score(), -6.0);

    // Typing and redo are swallowed while locked
    assert_eq!(controller.key(&key("a")).unwrap(), InputOutcome::Suppressed);
    assert_eq!(
        controller.key(&key("ctrl+shift+z")).unwrap(),
        InputOutcome::Suppressed
    );
    assert_eq!(controller.type_text("x").unwrap(), InputOutcome::Suppressed);
    assert!(controller.text().ends_with("values[30]"));

    let outcome = controller.key(&key("ctrl+z")).unwrap();
    assert_eq!(outcome, InputOutcome::Unlocked { refunded: 6.0 });
    assert!(!controller.is_locked());
    assert_eq!(controller.text(), "values = []\n");
    assert_eq!(controller.score(), 0.0);
    assert_eq!(ScoreStore::new(dir.path()).load(), 0.0);

    let entries = log_entries(&log_path);
    let events: Vec<&str> = entries.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(events, vec!["locked", "unlocked"]);
    assert_eq!(entries[0].line_count, Some(30));
    assert_eq!(entries[1].detail.as_deref(), Some("undo_reverted"));
    assert!(entries.iter().all(|e| e.session_id == controller.session_id()));
}

#[tokio::test]
async fn test_quiz_pass_refunds_penalty() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(spawn_backend().await, dir.path());
    let mut controller = Controller::new(&config, "", SessionLog::disabled()).unwrap();

    controller.paste(&thirty_lines()).unwrap();
    assert_eq!(ScoreStore::new(dir.path()).load(), -6.0);
    wait_for_question(&mut controller).await;

    let retry = controller.submit_answer("no idea").await;
    assert_eq!(retry, AnswerOutcome::Retry("Look at the loop body again.".into()));
    assert!(controller.is_locked());
    // The feedback becomes the prompt for the retry
    assert_eq!(
        controller.current_question(),
        Some("Look at the loop body again.")
    );

    let next = controller.submit_answer("It sums the values").await;
    assert_eq!(
        next,
        AnswerOutcome::NextQuestion("What happens when the list is empty?".into())
    );
    assert!(controller.is_locked());

    let passed = controller.submit_answer("The total stays at zero").await;
    assert_eq!(
        passed,
        AnswerOutcome::Passed {
            feedback: "Excellent analysis!".into(),
            refunded: 6.0,
            failed_open: false,
        }
    );
    assert!(!controller.is_locked());
    assert_eq!(controller.score(), 0.0);
    // The pasted code stays after a pass
    assert!(controller.text().ends_with("values[30]"));
    assert_eq!(ScoreStore::new(dir.path()).load(), 0.0);

    assert_eq!(controller.submit_answer("again").await, AnswerOutcome::NotAsked);
}

#[tokio::test]
async fn test_unreachable_mentor_falls_back_and_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("session.jsonl");
    let config = config(refused_endpoint().await, dir.path());
    let mut controller = Controller::new(&config, "", SessionLog::at(&log_path)).unwrap();

    let outcome = controller.paste(&thirty_lines()).unwrap();
    assert!(matches!(outcome, InputOutcome::Locked { .. }));
    let (streamed, update) = wait_for_question(&mut controller).await;
    assert!(streamed.is_empty());
    assert_eq!(update, StreamUpdate::Fallback(FALLBACK_QUESTION.into()));
    assert_eq!(controller.current_question(), Some(FALLBACK_QUESTION));

    let outcome = controller.submit_answer("It adds numbers").await;
    assert_eq!(
        outcome,
        AnswerOutcome::Passed {
            feedback: FAIL_OPEN_FEEDBACK.into(),
            refunded: 6.0,
            failed_open: true,
        }
    );
    assert_eq!(controller.score(), 0.0);

    let entries = log_entries(&log_path);
    let answer = entries.iter().find(|e| e.event == "answer").unwrap();
    assert!(answer.failed_open);
}

#[tokio::test]
async fn test_internal_paste_is_not_penalized() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(refused_endpoint().await, dir.path());
    let mut controller = Controller::new(&config, "", SessionLog::disabled()).unwrap();

    controller.type_text(&thirty_lines()).unwrap();
    assert_eq!(controller.copy(1, 30).unwrap(), InputOutcome::Applied);
    let outcome = controller.paste(&format!("\n{}", thirty_lines())).unwrap();
    // Leading newline makes it a different text: not the copied block
    assert!(matches!(outcome, InputOutcome::Locked { .. }));
    controller.reset();
    assert_eq!(controller.score(), 0.0);

    let outcome = controller.paste(&thirty_lines()).unwrap();
    assert_eq!(outcome, InputOutcome::Applied);
    assert!(!controller.is_locked());
}

#[tokio::test]
async fn test_mentor_chord_and_chat() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(spawn_backend().await, dir.path());
    let mut controller =
        Controller::new(&config, "a = 1\nb = 2\n", SessionLog::disabled()).unwrap();

    assert_eq!(
        controller.key(&key("ctrl+m")).unwrap(),
        InputOutcome::MentorRequested
    );
    let reply = controller
        .trigger_mentor("why b?", Some((2, 2)), &mut |_: &str| {})
        .await
        .unwrap();
    assert_eq!(reply, "You asked: why b?");

    controller.paste(&thirty_lines()).unwrap();
    assert!(controller
        .trigger_mentor("help", None, &mut |_: &str| {})
        .await
        .is_err());
}

#[tokio::test]
async fn test_typing_and_backspace() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(refused_endpoint().await, dir.path());
    let mut controller = Controller::new(&config, "", SessionLog::disabled()).unwrap();

    for chord in ["x", "space", "=", "space", "1", "enter"] {
        assert_eq!(controller.key(&key(chord)).unwrap(), InputOutcome::Applied);
    }
    assert_eq!(controller.text(), "x = 1\n");
    controller.key(&key("backspace")).unwrap();
    assert_eq!(controller.text(), "x = 1");
    assert_eq!(controller.key(&key("left")).unwrap(), InputOutcome::Ignored);

    // Unlocked undo goes straight to the editor
    assert_eq!(controller.key(&key("ctrl+z")).unwrap(), InputOutcome::Applied);
    assert_eq!(controller.text(), "x = 1\n");
}

#[tokio::test]
async fn test_undo_while_question_stream_stalls() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(spawn_stalled_backend().await, dir.path());
    let mut controller = Controller::new(&config, "", SessionLog::disabled()).unwrap();

    let outcome = controller.paste(&thirty_lines()).unwrap();
    assert!(matches!(outcome, InputOutcome::Locked { .. }));
    assert!(controller.question_pending());
    assert_eq!(controller.current_question(), None);

    // The backend never finishes; undo does not wait for it
    let outcome = controller.key(&key("ctrl+z")).unwrap();
    assert_eq!(outcome, InputOutcome::Unlocked { refunded: 6.0 });
    assert!(!controller.is_locked());
    assert!(!controller.question_pending());
    assert_eq!(controller.text(), "");
}

#[tokio::test]
async fn test_stalled_question_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let config = SocraticConfig {
        stream_idle_timeout_secs: 1,
        ..config(spawn_stalled_backend().await, dir.path())
    };
    let mut controller = Controller::new(&config, "", SessionLog::disabled()).unwrap();

    controller.paste(&thirty_lines()).unwrap();
    let (streamed, update) = wait_for_question(&mut controller).await;
    assert_eq!(streamed, "About total += values[1]");
    assert_eq!(update, StreamUpdate::Fallback(FALLBACK_QUESTION.into()));
    assert!(controller.is_locked());
    assert_eq!(controller.current_question(), Some(FALLBACK_QUESTION));
}

#[tokio::test]
async fn test_superseded_stream_events_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(spawn_stalled_backend().await, dir.path());
    let mut controller = Controller::new(&config, "", SessionLog::disabled()).unwrap();

    controller.paste(&lines_of("first")).unwrap();
    let held = tokio::time::timeout(Duration::from_secs(5), controller.next_stream_event())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(held, StreamEvent::Chunk { .. }));

    // Undo cancels the first stream, a new paste starts another one
    assert!(matches!(
        controller.key(&key("ctrl+z")).unwrap(),
        InputOutcome::Unlocked { .. }
    ));
    assert!(matches!(
        controller.paste(&lines_of("second")).unwrap(),
        InputOutcome::Locked { .. }
    ));

    assert_eq!(controller.apply_stream_event(held), StreamUpdate::Stale);
    assert!(controller.session().transcript().is_empty());
    assert!(controller.question_pending());

    let text = loop {
        let event = tokio::time::timeout(Duration::from_secs(5), controller.next_stream_event())
            .await
            .unwrap()
            .unwrap();
        if let StreamUpdate::Chunk(text) = controller.apply_stream_event(event) {
            break text;
        }
    };
    assert_eq!(text, "About second += values[1]");
    assert_eq!(controller.session().transcript().len(), 1);
}
