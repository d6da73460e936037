// ABOUTME: Run identity, run status state machine and point-in-time run snapshots
// ABOUTME: Defines the result structures reported for every command execution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// `Pending -> Running -> {Succeeded, Failed, Cancelled}`; spawn failures
/// go straight from `Pending` to `Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub template_id: String,
    pub command_id: String,
    pub command_line: String,
    pub status: RunStatus,
    pub pid: Option<u32>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, with = "humantime_serde")]
    pub duration: Option<Duration>,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
}

impl RunSnapshot {
    pub fn new(
        run_id: RunId,
        template_id: impl Into<String>,
        command_id: impl Into<String>,
        command_line: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            template_id: template_id.into(),
            command_id: command_id.into(),
            command_line: command_line.into(),
            status: RunStatus::Pending,
            pid: None,
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            error: None,
        }
    }

    pub fn mark_started(&mut self, pid: Option<u32>) {
        self.status = RunStatus::Running;
        self.pid = pid;
        self.start_time = Utc::now();
    }

    pub fn mark_completed(&mut self, status: RunStatus, exit_code: Option<i32>, error: Option<String>) {
        let end_time = Utc::now();
        self.status = status;
        self.end_time = Some(end_time);
        self.duration = Some(
            (end_time - self.start_time)
                .to_std()
                .unwrap_or(Duration::ZERO),
        );
        self.exit_code = exit_code;
        self.error = error;
    }

    pub fn is_successful(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
