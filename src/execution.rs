use chrono::{DateTime, Utc};
use uuid::Uuid;

/// How a matched rule runs its commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Awaited by the request handler before it responds.
    Inline,
    /// Spawned in the background; the handler does not wait.
    Detached,
}

impl ExecutionMode {
    pub fn from_detached(detached: bool) -> Self {
        if detached {
            ExecutionMode::Detached
        } else {
            ExecutionMode::Inline
        }
    }
}

/// Represents the status of a single command run
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionStatus {
    Running,
    Success,
    Failed,
}

/// Outcome of running one configured command
#[derive(Debug, Clone)]
pub struct Execution {
    pub id: String,
    pub project_name: String,
    pub command: String,
    pub mode: ExecutionMode,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output: String,
    pub error: Option<String>,
}

impl Execution {
    /// Create a new execution in Running status
    pub fn start(project_name: &str, command: &str, mode: ExecutionMode) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            project_name: project_name.to_string(),
            command: command.to_string(),
            mode,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            output: String::new(),
            error: None,
        }
    }

    /// Mark execution as successful with the captured output
    pub fn mark_success(&mut self, output: String) {
        self.status = ExecutionStatus::Success;
        self.completed_at = Some(Utc::now());
        self.output = output;
    }

    /// Mark execution as failed, keeping whatever output was produced before the failure
    pub fn mark_failed(&mut self, output: String, error: String) {
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.output = output;
        self.error = Some(error);
    }

    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Wall-clock run time, once the execution has completed.
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds())
    }
}
