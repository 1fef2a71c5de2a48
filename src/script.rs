//! Command scripts for the engine's numeric menu.
//!
//! The engine shows a six-entry menu and then prompts for any follow-up
//! text. Each [`Operation`] maps to one fixed interleaving of menu digit,
//! arguments, and the exit digit:
//!
//! | Operation | Lines |
//! |-----------|-------|
//! | `Search(term)` | `1`, term, `6` |
//! | `ProcessDocuments` | `2`, `6` |
//! | `ShowHistory` | `3`, `6` |
//! | `Undo` | `4`, `6` |
//! | `TracePath(a, b)` | `5`, a, b, `6` |
//!
//! Every step also records the prompt it waits for (event-driven sessions)
//! and the minimum pause since the previous write (fixed-delay sessions).

use std::time::Duration;

use crate::config::SessionConfig;
use crate::error::{BridgeError, Result};
use crate::models::{CommandScript, Operation, ScriptStep, Trigger};

pub const MENU_SEARCH: &str = "1";
pub const MENU_PROCESS: &str = "2";
pub const MENU_HISTORY: &str = "3";
pub const MENU_UNDO: &str = "4";
pub const MENU_TRACE_PATH: &str = "5";
pub const MENU_EXIT: &str = "6";

pub const PROMPT_SEARCH_TERM: &str = "Enter search term";
pub const PROMPT_FIRST_KEYWORD: &str = "Enter first keyword";
pub const PROMPT_SECOND_KEYWORD: &str = "Enter second keyword";

/// Spacing used by fixed-delay sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDelays {
    /// Pause before an ordinary line.
    pub step: Duration,
    /// Pause after a selection that triggers long synchronous work.
    pub long_work: Duration,
}

impl Default for StepDelays {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(200),
            long_work: Duration::from_millis(3000),
        }
    }
}

impl From<&SessionConfig> for StepDelays {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            step: Duration::from_millis(cfg.step_delay_ms),
            long_work: Duration::from_millis(cfg.process_step_delay_ms),
        }
    }
}

/// Build the script for `op` with default delays.
pub fn build(op: &Operation) -> Result<CommandScript> {
    build_with(op, StepDelays::default())
}

/// Build the script for `op`. Arguments are validated here so that an
/// invalid request never starts a process.
pub fn build_with(op: &Operation, delays: StepDelays) -> Result<CommandScript> {
    let menu = |digit: &str| ScriptStep {
        line: digit.to_string(),
        trigger: Some(Trigger::Ready),
        min_delay: Duration::ZERO,
    };
    let reply = |text: &str, prompt: &'static str| ScriptStep {
        line: text.to_string(),
        trigger: Some(Trigger::Prompt(prompt)),
        min_delay: delays.step,
    };
    let exit_after = |pause: Duration| ScriptStep {
        line: MENU_EXIT.to_string(),
        trigger: Some(Trigger::Ready),
        min_delay: pause,
    };

    let steps = match op {
        Operation::Search(term) => {
            let term = checked_term(term, "search term")?;
            vec![
                menu(MENU_SEARCH),
                reply(term, PROMPT_SEARCH_TERM),
                exit_after(delays.step),
            ]
        }
        Operation::ProcessDocuments => {
            vec![menu(MENU_PROCESS), exit_after(delays.long_work)]
        }
        Operation::ShowHistory => vec![menu(MENU_HISTORY), exit_after(delays.step)],
        Operation::Undo => vec![menu(MENU_UNDO), exit_after(delays.step)],
        Operation::TracePath(a, b) => {
            let a = checked_term(a, "first path term")?;
            let b = checked_term(b, "second path term")?;
            if a.to_lowercase() == b.to_lowercase() {
                return Err(BridgeError::invalid(format!(
                    "cannot trace a path from '{}' to itself",
                    a
                )));
            }
            vec![
                menu(MENU_TRACE_PATH),
                reply(a, PROMPT_FIRST_KEYWORD),
                reply(b, PROMPT_SECOND_KEYWORD),
                exit_after(delays.step),
            ]
        }
    };

    Ok(CommandScript::new(steps))
}

/// Trimmed term, or `InvalidArgument` when empty or multi-line.
fn checked_term<'a>(term: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::invalid(format!("{} must not be empty", what)));
    }
    if trimmed.contains(['\n', '\r']) {
        return Err(BridgeError::invalid(format!(
            "{} must be a single line",
            what
        )));
    }
    Ok(trimmed)
}
