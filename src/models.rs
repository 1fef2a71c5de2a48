//! Core data types shared by the script builder, session, parser, and
//! orchestrator.
//!
//! Report types derive `Serialize` so they can be returned verbatim from the
//! HTTP API and the `--json` CLI output.

use serde::Serialize;
use std::time::Duration;

/// What the caller wants the engine to do. Constructed once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Search(String),
    ProcessDocuments,
    ShowHistory,
    Undo,
    TracePath(String, String),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Search(_) => OperationKind::Search,
            Operation::ProcessDocuments => OperationKind::Process,
            Operation::ShowHistory => OperationKind::History,
            Operation::Undo => OperationKind::Undo,
            Operation::TracePath(_, _) => OperationKind::Path,
        }
    }

    /// Short stable name used in logs and reports.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Which operation a report came from, without its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Search,
    Process,
    History,
    Undo,
    Path,
}

impl OperationKind {
    pub fn name(self) -> &'static str {
        match self {
            OperationKind::Search => "search",
            OperationKind::Process => "process",
            OperationKind::History => "history",
            OperationKind::Undo => "undo",
            OperationKind::Path => "path",
        }
    }
}

/// Output the session waits for before writing a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The engine's menu banner (configurable, `Choose an option` by default).
    Ready,
    /// A fixed follow-up prompt such as `Enter search term`.
    Prompt(&'static str),
}

/// One line written to the engine's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    /// Text to write, without the trailing newline.
    pub line: String,
    /// Output substring that must appear before the line is written
    /// (event-driven synchronization).
    pub trigger: Option<Trigger>,
    /// Minimum pause since the previous write (fixed-delay synchronization).
    pub min_delay: Duration,
}

/// The exact sequence of lines to send for one operation.
///
/// Built once per [`Operation`] and consumed by exactly one session run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandScript {
    steps: Vec<ScriptStep>,
}

impl CommandScript {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    /// Just the lines, in write order.
    pub fn lines(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.line.as_str()).collect()
    }
}

/// Lifecycle phase of a console session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Starting,
    AwaitingReady,
    Sending,
    Draining,
    Closed,
}

/// Captured outcome of one engine run. Never mutated after capture.
#[derive(Debug, Clone)]
pub struct SessionResult {
    /// Everything the engine wrote to stdout.
    pub raw_output: String,
    /// Everything the engine wrote to stderr, kept apart for diagnostics.
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Phase the session was in when the deadline fired.
    pub timed_out_in: Option<SessionPhase>,
    pub elapsed: Duration,
}

/// A document that matched a search, in engine order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentHit {
    pub rank: u32,
    pub name: String,
    pub frequency: u32,
}

/// Outcome of a path trace between two terms. `Indeterminate` means the
/// output carried no path markers at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PathResult {
    Found {
        nodes: Vec<String>,
        length: u32,
        connection_count: u32,
        degree_description: String,
    },
    NotFound,
    #[default]
    Indeterminate,
}

/// What the engine said about an undo request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoOutcome {
    Applied,
    NothingToUndo,
}

/// Structured view of a session's stdout. Every field is empty when the
/// corresponding section is absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedReport {
    pub documents: Vec<DocumentHit>,
    pub total_matches: u32,
    pub suggestions: Vec<String>,
    pub related_terms: Vec<String>,
    pub history_entries: Vec<String>,
    pub path_result: PathResult,
    pub process_complete: bool,
    pub processed_documents: Option<u32>,
    pub undo: Option<UndoOutcome>,
}

/// A file attachment decoded from a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Result of one orchestrated operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub operation: OperationKind,
    pub report: ParsedReport,
    pub timed_out: bool,
    pub exit_code: Option<i32>,
    pub stderr: String,
    pub elapsed_ms: u64,
}
