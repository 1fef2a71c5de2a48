//! Runs one [`Operation`] end to end: script, session, parse.
//!
//! The engine has no notion of concurrent clients, so every run holds the
//! single [`SessionSlot`] permit. A second caller either waits for it
//! ([`BusyPolicy::Queue`]) or is turned away with
//! [`BridgeError::SessionBusy`] ([`BusyPolicy::Reject`]).

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{BusyPolicy, Config, SessionConfig};
use crate::error::{BridgeError, Result};
use crate::models::{Operation, OperationReport};
use crate::parser;
use crate::script::{self, StepDelays};
use crate::session::{ConsoleSession, EngineCommand, SessionPolicy, SessionRunner};

/// The one place an engine session may run.
#[derive(Debug, Clone)]
pub struct SessionSlot {
    permit: Arc<Semaphore>,
    policy: BusyPolicy,
    queue_timeout: Duration,
}

impl SessionSlot {
    pub fn new(policy: BusyPolicy, queue_timeout: Duration) -> Self {
        Self {
            permit: Arc::new(Semaphore::new(1)),
            policy,
            queue_timeout,
        }
    }

    /// Claim the slot. The engine is free again when the permit drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        match self.policy {
            BusyPolicy::Reject => self
                .permit
                .clone()
                .try_acquire_owned()
                .map_err(|_| BridgeError::SessionBusy),
            BusyPolicy::Queue => {
                match tokio::time::timeout(self.queue_timeout, self.permit.clone().acquire_owned())
                    .await
                {
                    Ok(Ok(permit)) => Ok(permit),
                    _ => Err(BridgeError::SessionBusy),
                }
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.permit.available_permits() == 0
    }
}

pub struct Orchestrator {
    session: SessionConfig,
    runner: Arc<dyn SessionRunner>,
    slot: SessionSlot,
}

impl Orchestrator {
    /// Orchestrator backed by the engine process named in `config`.
    pub fn new(config: &Config) -> Self {
        let runner = ConsoleSession::new(EngineCommand::from_config(&config.engine));
        Self::with_runner(config.session.clone(), Arc::new(runner))
    }

    pub fn with_runner(session: SessionConfig, runner: Arc<dyn SessionRunner>) -> Self {
        let slot = SessionSlot::new(
            session.busy,
            Duration::from_secs(session.queue_timeout_secs),
        );
        Self {
            session,
            runner,
            slot,
        }
    }

    pub fn slot(&self) -> &SessionSlot {
        &self.slot
    }

    /// Validate, run, and parse `op`.
    ///
    /// Invalid arguments are rejected before the slot is claimed. A timed-out
    /// session still yields a report built from its partial output.
    pub async fn execute(&self, op: Operation) -> Result<OperationReport> {
        let script = script::build_with(&op, StepDelays::from(&self.session))?;
        let policy = SessionPolicy::for_operation(&self.session, &op);

        let _permit = self.slot.acquire().await?;
        tracing::info!(operation = op.name(), "running engine operation");

        let result = self.runner.run(&script, &policy).await?;

        if result.timed_out {
            tracing::warn!(
                operation = op.name(),
                phase = ?result.timed_out_in,
                "engine timed out, returning partial report"
            );
        }
        if let Some(code) = result.exit_code.filter(|c| *c != 0) {
            tracing::warn!(
                operation = op.name(),
                code,
                stderr = %result.stderr.trim(),
                "engine exited with non-zero status"
            );
        }

        let report = parser::parse(&result.raw_output);
        tracing::info!(
            operation = op.name(),
            hits = report.documents.len(),
            elapsed_ms = result.elapsed.as_millis() as u64,
            "engine operation finished"
        );

        Ok(OperationReport {
            operation: op.kind(),
            report,
            timed_out: result.timed_out,
            exit_code: result.exit_code,
            stderr: result.stderr,
            elapsed_ms: result.elapsed.as_millis() as u64,
        })
    }
}
