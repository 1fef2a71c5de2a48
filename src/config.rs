use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::Operation;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Path to the engine executable.
    pub path: PathBuf,
    /// Working directory for the engine. Defaults to the executable's directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Where uploaded documents are written before `process` runs.
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("../documents")
}

/// How stdin writes are synchronized with the engine's prompts.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Wait for the ready marker or prompt before each write.
    Event,
    /// Sleep fixed quanta between writes.
    FixedDelay,
}

/// What happens when an operation arrives while another is running.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    Reject,
    Queue,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_sync")]
    pub sync: SyncStrategy,
    #[serde(default = "default_ready_marker")]
    pub ready_marker: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_process_timeout_secs")]
    pub process_timeout_secs: u64,
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default = "default_process_step_delay_ms")]
    pub process_step_delay_ms: u64,
    #[serde(default = "default_busy")]
    pub busy: BusyPolicy,
    #[serde(default = "default_queue_timeout_secs")]
    pub queue_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sync: SyncStrategy::Event,
            ready_marker: default_ready_marker(),
            timeout_secs: 20,
            process_timeout_secs: 60,
            kill_grace_ms: 1000,
            startup_delay_ms: 2000,
            step_delay_ms: 200,
            process_step_delay_ms: 3000,
            busy: BusyPolicy::Queue,
            queue_timeout_secs: 30,
        }
    }
}

fn default_sync() -> SyncStrategy {
    SyncStrategy::Event
}
fn default_ready_marker() -> String {
    "Choose an option".to_string()
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_process_timeout_secs() -> u64 {
    60
}
fn default_kill_grace_ms() -> u64 {
    1000
}
fn default_startup_delay_ms() -> u64 {
    2000
}
fn default_step_delay_ms() -> u64 {
    200
}
fn default_process_step_delay_ms() -> u64 {
    3000
}
fn default_busy() -> BusyPolicy {
    BusyPolicy::Queue
}
fn default_queue_timeout_secs() -> u64 {
    30
}

impl SessionConfig {
    /// Wall-clock budget for one run of `op`.
    pub fn timeout_for(&self, op: &Operation) -> Duration {
        match op {
            Operation::ProcessDocuments => Duration::from_secs(self.process_timeout_secs),
            _ => Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}
fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

impl EngineConfig {
    /// Directory the engine runs in: the configured one, or the directory
    /// holding the executable.
    pub fn resolved_working_dir(&self) -> PathBuf {
        match &self.working_dir {
            Some(dir) => dir.clone(),
            None => self
                .path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl Config {
    /// Configuration used when no config file is present: the engine is
    /// expected at `../c-engine/search_engine` with the platform suffix.
    pub fn minimal() -> Self {
        let binary = format!("search_engine{}", std::env::consts::EXE_SUFFIX);
        Self {
            engine: EngineConfig {
                path: PathBuf::from("../c-engine").join(binary),
                working_dir: None,
                args: Vec::new(),
                documents_dir: default_documents_dir(),
            },
            session: SessionConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;

    // Relative engine and document paths are taken relative to the config file
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.rebased(base))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.engine.path.as_os_str().is_empty() {
        anyhow::bail!("engine.path must not be empty");
    }

    // Validate session
    if config.session.timeout_secs == 0 || config.session.process_timeout_secs == 0 {
        anyhow::bail!("session timeouts must be > 0");
    }

    if config.session.ready_marker.trim().is_empty() {
        anyhow::bail!("session.ready_marker must not be empty");
    }

    Ok(config)
}

impl Config {
    fn rebased(mut self, base: &Path) -> Self {
        if self.engine.path.is_relative() {
            self.engine.path = base.join(&self.engine.path);
        }
        if let Some(dir) = self.engine.working_dir.take() {
            self.engine.working_dir = Some(if dir.is_relative() { base.join(dir) } else { dir });
        }
        if self.engine.documents_dir.is_relative() {
            self.engine.documents_dir = base.join(&self.engine.documents_dir);
        }
        self
    }
}
