//! Engine sessions against shell stand-ins for the search engine.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use kgs_bridge::config::{parse_config, SyncStrategy};
use kgs_bridge::error::BridgeError;
use kgs_bridge::models::{Operation, OperationKind, PathResult, SessionPhase, UndoOutcome};
use kgs_bridge::orchestrator::Orchestrator;
use kgs_bridge::script;
use kgs_bridge::session::{self, EngineCommand, SessionPolicy};
use tempfile::TempDir;

/// Shell stand-in for the engine, speaking the six-option console protocol.
const FAKE_ENGINE: &str = r#"
printf 'Initializing Knowledge Graph Search System...\n'
printf 'System initialized successfully!\n'
searches=""
while true; do
  printf '\n=== KNOWLEDGE GRAPH SEARCH SYSTEM ===\n'
  printf '1. Search Keyword\n2. Process Documents\n3. Show Search History\n'
  printf '4. Undo Last Search\n5. Trace Path Between Keywords\n6. Exit\n'
  printf 'Choose an option: '
  IFS= read -r choice || exit 0
  printf 'engine got choice %s\n' "$choice" >&2
  case "$choice" in
    1)
      printf 'Enter search term: '
      IFS= read -r term || exit 0
      searches="$term"
      printf '\n=== SEARCH RESULTS FOR: %s ===\n' "$term"
      printf 'SUGGESTIONS: %s, %ss\n' "$term" "$term"
      printf 'FOUND_IN: 2 documents\n'
      printf 'RESULT: 1. report.txt (frequency: 5)\n'
      printf 'RESULT: 2. notes.txt (frequency: 2)\n'
      printf 'RELATED: graph, node\n'
      printf 'HISTORY: %s\n' "$term"
      printf '=== END RESULTS ===\n'
      ;;
    2)
      n=$(ls ../documents 2>/dev/null | wc -l | tr -d ' ')
      printf '\n=== PROCESSING DOCUMENTS FROM: ../documents ===\n'
      printf '=== PROCESSED %s DOCUMENTS ===\n\n' "$n"
      ;;
    3)
      printf '\nSearch History:\n1. graph\n2. rust\n'
      ;;
    4)
      printf 'No searches to undo.\n'
      ;;
    5)
      printf '\n=== PATH TRACING ===\n'
      printf 'Enter first keyword: '
      IFS= read -r a || exit 0
      printf 'Enter second keyword: '
      IFS= read -r b || exit 0
      printf "\nSearching for path from '%s' to '%s'...\n" "$a" "$b"
      printf '\nPATH FOUND! (Length: 3)\nPath: %s -> animal -> %s\n' "$a" "$b"
      printf '\nRelationship strength: 2 connection(s)\n'
      printf '2nd degree connection (connected through 1 intermediate keyword)\n'
      printf '=== END PATH TRACING ===\n'
      ;;
    6)
      printf 'Exiting system. Goodbye!\n'
      exit 0
      ;;
    *)
      printf 'Invalid option. Please try again.\n'
      ;;
  esac
done
"#;

/// Prints a line and then hangs without ever showing the menu.
const SILENT_ENGINE: &str = r#"
printf 'Initializing Knowledge Graph Search System...\n'
exec sleep 30
"#;

/// Ignores SIGTERM so only the force kill stops it.
const STUBBORN_ENGINE: &str = r#"
trap '' TERM
printf 'stubborn engine starting\n'
while true; do sleep 1; done
"#;

/// Shows the menu once and exits with status 3 without reading input.
const QUITTER_ENGINE: &str = r#"
printf 'Choose an option: '
exit 3
"#;

/// Sleeps before showing the menu so sessions overlap in time.
const SLOW_ENGINE: &str = r#"
sleep 1
printf 'Choose an option: '
IFS= read -r choice
printf 'No searches to undo.\n'
printf 'Choose an option: '
IFS= read -r choice
exit 0
"#;

/// Answers one menu choice, then hangs before showing the menu again.
const HALTING_ENGINE: &str = r#"
printf 'Choose an option: '
IFS= read -r choice
printf 'No searches to undo.\n'
exec sleep 30
"#;

/// Lay out `<root>/engine/engine.sh` and `<root>/documents`, mirroring the
/// engine's expectation that documents live in `../documents`.
fn write_engine(root: &Path, script: &str) -> PathBuf {
    let engine_dir = root.join("engine");
    fs::create_dir_all(&engine_dir).unwrap();
    fs::create_dir_all(root.join("documents")).unwrap();
    let path = engine_dir.join("engine.sh");
    fs::write(&path, script).unwrap();
    path
}

/// Config TOML that runs `script_path` through `/bin/sh`.
fn config_toml(root: &Path, script_path: &Path, extra: &str) -> String {
    format!(
        r#"[engine]
path = "/bin/sh"
args = ["{script}"]
working_dir = "{root}/engine"
documents_dir = "{root}/documents"

{extra}
"#,
        script = script_path.display(),
        root = root.display(),
        extra = extra,
    )
}

fn shell_engine(root: &Path, script: &str) -> EngineCommand {
    let path = write_engine(root, script);
    EngineCommand {
        program: PathBuf::from("/bin/sh"),
        args: vec![path.display().to_string()],
        working_dir: root.join("engine"),
    }
}

fn policy(timeout: Duration) -> SessionPolicy {
    SessionPolicy {
        sync: SyncStrategy::Event,
        ready_marker: "Choose an option".into(),
        timeout,
        kill_grace: Duration::from_millis(300),
        startup_delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn search_session_captures_full_report() {
    let tmp = TempDir::new().unwrap();
    let engine = shell_engine(tmp.path(), FAKE_ENGINE);
    let script = script::build(&Operation::Search("graph".into())).unwrap();

    let result = session::run(&engine, &script, &policy(Duration::from_secs(10)))
        .await
        .unwrap();

    assert!(!result.timed_out);
    assert_eq!(result.timed_out_in, None);
    assert_eq!(result.exit_code, Some(0));
    assert!(result.raw_output.contains("=== END RESULTS ==="));
    assert!(result.raw_output.contains("Goodbye"));
    assert!(result.stderr.contains("engine got choice 1"));
    assert!(result.stderr.contains("engine got choice 6"));

    let report = kgs_bridge::parser::parse(&result.raw_output);
    assert_eq!(report.total_matches, 2);
    assert_eq!(report.documents.len(), 2);
    assert_eq!(report.documents[0].name, "report.txt");
    assert_eq!(report.suggestions, vec!["graph", "graphs"]);
    assert_eq!(report.history_entries, vec!["graph"]);
}

#[tokio::test]
async fn path_session_answers_both_prompts() {
    let tmp = TempDir::new().unwrap();
    let engine = shell_engine(tmp.path(), FAKE_ENGINE);
    let script = script::build(&Operation::TracePath("cat".into(), "pet".into())).unwrap();

    let result = session::run(&engine, &script, &policy(Duration::from_secs(10)))
        .await
        .unwrap();

    assert!(!result.timed_out);
    let report = kgs_bridge::parser::parse(&result.raw_output);
    match report.path_result {
        PathResult::Found {
            nodes,
            length,
            connection_count,
            degree_description,
        } => {
            assert_eq!(nodes, vec!["cat", "animal", "pet"]);
            assert_eq!(length, 3);
            assert_eq!(connection_count, 2);
            assert!(degree_description.starts_with("2nd degree"));
        }
        other => panic!("expected a path, got {:?}", other),
    }
}

#[tokio::test]
async fn fixed_delay_strategy_still_completes() {
    let tmp = TempDir::new().unwrap();
    let engine = shell_engine(tmp.path(), FAKE_ENGINE);
    let script = script::build_with(
        &Operation::Undo,
        script::StepDelays {
            step: Duration::from_millis(100),
            long_work: Duration::from_millis(100),
        },
    )
    .unwrap();
    let mut policy = policy(Duration::from_secs(10));
    policy.sync = SyncStrategy::FixedDelay;
    policy.startup_delay = Duration::from_millis(200);

    let result = session::run(&engine, &script, &policy).await.unwrap();

    assert!(!result.timed_out);
    assert_eq!(result.exit_code, Some(0));
    let report = kgs_bridge::parser::parse(&result.raw_output);
    assert_eq!(report.undo, Some(UndoOutcome::NothingToUndo));
}

#[tokio::test]
async fn engine_exiting_early_is_not_a_timeout() {
    let tmp = TempDir::new().unwrap();
    let engine = shell_engine(tmp.path(), QUITTER_ENGINE);
    let script = script::build(&Operation::Search("graph".into())).unwrap();

    let result = session::run(&engine, &script, &policy(Duration::from_secs(10)))
        .await
        .unwrap();

    assert!(!result.timed_out);
    assert_eq!(result.exit_code, Some(3));
    assert_eq!(result.raw_output, "Choose an option: ");
}

#[tokio::test]
async fn silent_engine_times_out_with_partial_output() {
    let tmp = TempDir::new().unwrap();
    let engine = shell_engine(tmp.path(), SILENT_ENGINE);
    let script = script::build(&Operation::ShowHistory).unwrap();

    let started = Instant::now();
    let result = session::run(&engine, &script, &policy(Duration::from_secs(1)))
        .await
        .unwrap();

    assert!(result.timed_out);
    assert_eq!(result.timed_out_in, Some(SessionPhase::AwaitingReady));
    assert!(result.raw_output.contains("Initializing"));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn hang_before_second_menu_reports_awaiting_ready() {
    let tmp = TempDir::new().unwrap();
    let engine = shell_engine(tmp.path(), HALTING_ENGINE);
    let script = script::build(&Operation::Undo).unwrap();

    let result = session::run(&engine, &script, &policy(Duration::from_secs(1)))
        .await
        .unwrap();

    assert!(result.timed_out);
    assert_eq!(result.timed_out_in, Some(SessionPhase::AwaitingReady));
    assert!(result.raw_output.contains("No searches to undo."));
}

#[tokio::test]
async fn engine_ignoring_sigterm_is_killed() {
    let tmp = TempDir::new().unwrap();
    let engine = shell_engine(tmp.path(), STUBBORN_ENGINE);
    let script = script::build(&Operation::ShowHistory).unwrap();

    let started = Instant::now();
    let result = session::run(&engine, &script, &policy(Duration::from_millis(500)))
        .await
        .unwrap();

    assert!(result.timed_out);
    assert!(result.raw_output.contains("stubborn engine starting"));
    // Killed by signal, so there is no exit code
    assert_eq!(result.exit_code, None);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn missing_engine_is_unavailable() {
    let tmp = TempDir::new().unwrap();
    let engine = EngineCommand {
        program: tmp.path().join("c-engine/search_engine"),
        args: Vec::new(),
        working_dir: tmp.path().to_path_buf(),
    };
    let script = script::build(&Operation::Undo).unwrap();

    let err = session::run(&engine, &script, &policy(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::EngineUnavailable { .. }));
    assert!(err.to_string().contains("search_engine"));
}

// ============ Orchestrator over a real process ============

fn orchestrator(root: &Path, script: &str, session_toml: &str) -> Orchestrator {
    let path = write_engine(root, script);
    let cfg = parse_config(&config_toml(root, &path, session_toml)).unwrap();
    Orchestrator::new(&cfg)
}

#[tokio::test]
async fn process_reports_document_count() {
    let tmp = TempDir::new().unwrap();
    let orch = orchestrator(tmp.path(), FAKE_ENGINE, "");
    fs::write(tmp.path().join("documents/a.txt"), "alpha").unwrap();
    fs::write(tmp.path().join("documents/b.txt"), "beta").unwrap();

    let out = orch.execute(Operation::ProcessDocuments).await.unwrap();
    assert_eq!(out.operation, OperationKind::Process);
    assert!(out.report.process_complete);
    assert_eq!(out.report.processed_documents, Some(2));
}

#[tokio::test]
async fn history_falls_back_to_numbered_block() {
    let tmp = TempDir::new().unwrap();
    let orch = orchestrator(tmp.path(), FAKE_ENGINE, "");

    let out = orch.execute(Operation::ShowHistory).await.unwrap();
    assert_eq!(out.report.history_entries, vec!["graph", "rust"]);
    assert!(!out.timed_out);
    assert_eq!(out.exit_code, Some(0));
}

#[tokio::test]
async fn reject_policy_turns_away_overlapping_run() {
    let tmp = TempDir::new().unwrap();
    let orch = Arc::new(orchestrator(
        tmp.path(),
        SLOW_ENGINE,
        "[session]\nbusy = \"reject\"\n",
    ));

    let first = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.execute(Operation::Undo).await })
    };
    // Let the first run claim the slot and start sleeping
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(orch.slot().is_busy());

    let second = orch.execute(Operation::Undo).await;
    assert!(matches!(second, Err(BridgeError::SessionBusy)));

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.report.undo, Some(UndoOutcome::NothingToUndo));
    assert!(!orch.slot().is_busy());
}

#[tokio::test]
async fn queue_policy_runs_callers_one_after_another() {
    let tmp = TempDir::new().unwrap();
    let orch = Arc::new(orchestrator(tmp.path(), SLOW_ENGINE, ""));

    let started = Instant::now();
    let a = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.execute(Operation::Undo).await })
    };
    let b = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.execute(Operation::Undo).await })
    };

    assert!(a.await.unwrap().is_ok());
    assert!(b.await.unwrap().is_ok());
    // Each engine sleeps a second before its menu; serialized runs take at least two
    assert!(started.elapsed() >= Duration::from_secs(2));
}
