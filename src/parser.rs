//! Screen-scraper for the engine's text reports.
//!
//! [`parse`] is a pure, total function of the captured stdout: it never
//! fails, every section is extracted independently, and anything it does
//! not recognize is ignored. The literal tokens below are the engine's wire
//! contract; a change to them is a protocol change, not a parser bug.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{DocumentHit, ParsedReport, PathResult, UndoOutcome};

pub const TOKEN_FOUND_IN: &str = "FOUND_IN:";
pub const TOKEN_RESULT: &str = "RESULT:";
pub const TOKEN_SUGGESTIONS: &str = "SUGGESTIONS:";
pub const TOKEN_RELATED: &str = "RELATED:";
pub const TOKEN_HISTORY: &str = "HISTORY:";
pub const TOKEN_PATH_FOUND: &str = "PATH FOUND";
pub const TOKEN_NO_PATH_FOUND: &str = "NO PATH FOUND";
pub const TOKEN_PROCESS_COMPLETE: &str = "AUTOMATED_PROCESS_COMPLETE";

const HISTORY_BLOCK_HEADER: &str = "Search History:";
const UNDO_APPLIED: &str = "Undo: Returning to previous search";
const UNDO_EMPTY: &str = "No searches to undo.";

static FOUND_IN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"FOUND_IN:\s*(\d+)\s*documents").unwrap());
static RESULT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)RESULT:\s*(\d+)\.\s+([^(]+)\(frequency:\s*(\d+)\)").unwrap()
});
static PATH_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)Path:\s*(.+)$").unwrap());
static LENGTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Length:\s*(\d+)").unwrap());
static CONNECTIONS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s+connection\(s\)").unwrap());
static NTH_DEGREE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+) degree connection").unwrap());
static PROCESSED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"=== PROCESSED (\d+) DOCUMENTS ===").unwrap());
static NUMBERED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.\s+(.+?)\s*$").unwrap());

/// Convert captured engine output into a [`ParsedReport`].
pub fn parse(raw: &str) -> ParsedReport {
    let lines: Vec<&str> = raw.lines().collect();
    let mut report = ParsedReport::default();

    for line in &lines {
        if line.contains(TOKEN_FOUND_IN) {
            if let Some(n) = FOUND_IN_RE
                .captures(line)
                .and_then(|c| c[1].parse::<u32>().ok())
            {
                report.total_matches = n;
            }
        }
        if line.contains(TOKEN_RESULT) {
            if let Some(hit) = parse_hit(line) {
                report.documents.push(hit);
            }
        }
    }

    report.suggestions = dedup(list_after(&lines, TOKEN_SUGGESTIONS, ","));
    report.related_terms = list_after(&lines, TOKEN_RELATED, ",");
    report.history_entries = list_after(&lines, TOKEN_HISTORY, "→");
    if report.history_entries.is_empty() {
        report.history_entries = history_block(&lines);
    }

    report.path_result = parse_path(raw, &lines);

    if let Some(n) = PROCESSED_RE
        .captures(raw)
        .and_then(|c| c[1].parse::<u32>().ok())
    {
        report.processed_documents = Some(n);
        report.process_complete = true;
    }
    if raw.contains(TOKEN_PROCESS_COMPLETE) {
        report.process_complete = true;
    }

    if raw.contains(UNDO_APPLIED) {
        report.undo = Some(UndoOutcome::Applied);
    } else if raw.contains(UNDO_EMPTY) {
        report.undo = Some(UndoOutcome::NothingToUndo);
    }

    report
}

fn parse_hit(line: &str) -> Option<DocumentHit> {
    let caps = RESULT_RE.captures(line)?;
    let rank = caps[1].parse::<u32>().ok()?;
    let frequency = caps[3].parse::<u32>().ok()?;
    let name = caps[2].trim();
    if rank == 0 || name.is_empty() {
        return None;
    }
    Some(DocumentHit {
        rank,
        name: name.to_string(),
        frequency,
    })
}

/// Entries from the first line carrying `token`, split on `sep`.
fn list_after(lines: &[&str], token: &str, sep: &str) -> Vec<String> {
    lines
        .iter()
        .find_map(|line| line.find(token).map(|at| &line[at + token.len()..]))
        .map(|rest| split_list(rest, sep))
        .unwrap_or_default()
}

fn split_list(text: &str, sep: &str) -> Vec<String> {
    text.split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Interactive history listing: a `Search History:` header followed by
/// numbered lines.
fn history_block(lines: &[&str]) -> Vec<String> {
    let Some(start) = lines.iter().position(|l| l.contains(HISTORY_BLOCK_HEADER)) else {
        return Vec::new();
    };
    lines[start + 1..]
        .iter()
        .map_while(|l| NUMBERED_RE.captures(l).map(|c| c[1].to_string()))
        .collect()
}

fn parse_path(raw: &str, lines: &[&str]) -> PathResult {
    if raw.contains(TOKEN_NO_PATH_FOUND) {
        return PathResult::NotFound;
    }
    if !raw.contains(TOKEN_PATH_FOUND) {
        return PathResult::Indeterminate;
    }

    let nodes = lines
        .iter()
        .find_map(|l| PATH_LINE_RE.captures(l))
        .map(|c| {
            let chain = c[1].trim();
            if chain.contains("->") {
                split_list(chain, "->")
            } else {
                split_list(chain, "→")
            }
        })
        .unwrap_or_default();

    // A found path without a readable chain cannot satisfy "at least one node"
    if nodes.is_empty() {
        return PathResult::Indeterminate;
    }

    let length = first_number(&LENGTH_RE, raw).unwrap_or(nodes.len() as u32);
    let connection_count =
        first_number(&CONNECTIONS_RE, raw).unwrap_or_else(|| length.saturating_sub(1));

    let degree_description = if raw.contains("Direct connection") {
        "Direct connection".to_string()
    } else if raw.contains("2nd degree connection") {
        "2nd degree connection".to_string()
    } else if let Some(n) = first_number(&NTH_DEGREE_RE, raw) {
        format!("{} degree connection", n)
    } else {
        format!("{} degree connection", connection_count)
    };

    PathResult::Found {
        nodes,
        length,
        connection_count,
        degree_description,
    }
}

fn first_number(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text).and_then(|c| c[1].parse().ok())
}
