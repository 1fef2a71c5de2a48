//! Plain-text rendering of operation reports for the CLI.

use std::fmt::Write;

use crate::models::{OperationKind, OperationReport, PathResult, UndoOutcome};

pub fn render_text(out: &OperationReport) -> String {
    let report = &out.report;
    let mut s = String::new();

    match out.operation {
        OperationKind::Search => {
            let _ = writeln!(s, "Found in {} documents", report.total_matches);
            for hit in &report.documents {
                let _ = writeln!(
                    s,
                    "{}. {}  (frequency: {})",
                    hit.rank, hit.name, hit.frequency
                );
            }
            write_list(&mut s, "Suggestions", &report.suggestions);
            write_list(&mut s, "Related", &report.related_terms);
            write_list(&mut s, "History", &report.history_entries);
        }
        OperationKind::Process => {
            if report.process_complete {
                match report.processed_documents {
                    Some(n) => {
                        let _ = writeln!(s, "Processed {} documents.", n);
                    }
                    None => s.push_str("Processing complete.\n"),
                }
            } else {
                s.push_str("Processing did not report completion.\n");
            }
        }
        OperationKind::History => {
            if report.history_entries.is_empty() {
                s.push_str("No search history available.\n");
            }
            for (i, entry) in report.history_entries.iter().enumerate() {
                let _ = writeln!(s, "{}. {}", i + 1, entry);
            }
        }
        OperationKind::Undo => match report.undo {
            Some(UndoOutcome::Applied) => s.push_str("Undid last search.\n"),
            Some(UndoOutcome::NothingToUndo) => s.push_str("No searches to undo.\n"),
            None => s.push_str("Engine did not confirm the undo.\n"),
        },
        OperationKind::Path => match &report.path_result {
            PathResult::Found {
                nodes,
                length,
                connection_count,
                degree_description,
            } => {
                let _ = writeln!(s, "Path: {}", nodes.join(" -> "));
                let _ = writeln!(
                    s,
                    "Length: {}, {} connection(s), {}",
                    length, connection_count, degree_description
                );
            }
            PathResult::NotFound => s.push_str("No path found.\n"),
            PathResult::Indeterminate => s.push_str("Engine gave no path answer.\n"),
        },
    }

    if out.timed_out {
        s.push_str("warning: engine timed out, results may be partial\n");
    }
    s
}

fn write_list(s: &mut String, label: &str, items: &[String]) {
    if !items.is_empty() {
        let _ = writeln!(s, "{}: {}", label, items.join(", "));
    }
}
