use crate::constants::{SANDBOX_TIMEOUT_EXIT_CODE, SANDBOX_TIMEOUT_STDERR};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

/// The closed set of producer roles a task can be routed to.
///
/// The wire format carries the task type as a free string so that submission
/// never fails on an unknown role; dispatch parses it into this enum and an
/// unparseable value becomes a terminal `failed` execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Codegen,
    Infra,
    Doc,
    Test,
    Analyze,
    Validate,
    Package,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Codegen => "codegen",
            TaskType::Infra => "infra",
            TaskType::Doc => "doc",
            TaskType::Test => "test",
            TaskType::Analyze => "analyze",
            TaskType::Validate => "validate",
            TaskType::Package => "package",
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "codegen" => Ok(TaskType::Codegen),
            "infra" => Ok(TaskType::Infra),
            "doc" => Ok(TaskType::Doc),
            "test" => Ok(TaskType::Test),
            "analyze" => Ok(TaskType::Analyze),
            "validate" => Ok(TaskType::Validate),
            "package" => Ok(TaskType::Package),
            _ => Err(format!("unsupported task type: {s}")),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority levels; stored on the execution record for observability.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// Optional per-task overrides of the sandbox isolation defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceLimits {
    pub cpu_millis: Option<i64>,
    pub memory_mb: Option<i64>,
    pub network_access: Option<bool>,
    pub filesystem_write: Option<bool>,
    pub disk_mb: Option<i64>,
}

/// A submitted software-generation task, immutable after submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Task {
    pub id: String,
    pub task_type: String,
    pub description: String,
    pub language: Option<String>,
    pub code: Option<String>,
    pub priority: Priority,
    pub timeout_seconds: Option<u64>,
    pub resource_limits: Option<ResourceLimits>,
    /// Set from the interface boundary, never from the request body.
    #[serde(skip_deserializing)]
    pub tenant_id: String,
    pub metadata: HashMap<String, String>,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: String::new(),
            task_type: String::new(),
            description: String::new(),
            language: None,
            code: None,
            priority: Priority::Medium,
            timeout_seconds: None,
            resource_limits: None,
            tenant_id: String::new(),
            metadata: HashMap::new(),
        }
    }
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        task_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Current status of an execution in the pipeline.
///
/// The partial order is pending < running < terminal; terminal states are
/// sinks and a record never regresses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Canceled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Timeout
                | ExecutionStatus::Canceled
        )
    }
}

impl FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            "timeout" => Ok(ExecutionStatus::Timeout),
            "canceled" => Ok(ExecutionStatus::Canceled),
            _ => Err(format!("unknown execution status: {s}")),
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Timeout => "timeout",
            ExecutionStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Measured resource consumption of a sandbox job.
///
/// Metrics the runtime does not report default to zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceUsage {
    pub cpu_time_ms: u64,
    pub peak_memory_mb: u64,
    pub disk_read_mb: u64,
    pub disk_write_mb: u64,
    pub network_rx_mb: u64,
    pub network_tx_mb: u64,
}

/// Outcome of one sandboxed run, reported back to the owning execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxResult {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    pub execution_time_ms: u64,
    pub resource_usage: ResourceUsage,
    pub file_outputs: Vec<String>,
    pub network_calls: Vec<String>,
    pub security_violations: Vec<String>,
}

impl SandboxResult {
    pub fn new(exit_code: i64, stdout: String, stderr: String, execution_time_ms: u64) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            execution_time_ms,
            resource_usage: ResourceUsage::default(),
            file_outputs: Vec::new(),
            network_calls: Vec::new(),
            security_violations: Vec::new(),
        }
    }

    /// Sentinel result for a job killed at its wall-clock deadline.
    pub fn timed_out(stdout: String, execution_time_ms: u64) -> Self {
        Self::new(
            SANDBOX_TIMEOUT_EXIT_CODE,
            stdout,
            SANDBOX_TIMEOUT_STDERR.to_string(),
            execution_time_ms,
        )
    }

    pub fn is_timeout(&self) -> bool {
        self.exit_code == SANDBOX_TIMEOUT_EXIT_CODE
    }
}

/// Score record attached by the validation oracle adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationResult {
    pub overall_score: f64,
    pub security_score: f64,
    pub quality_score: f64,
    pub passed: bool,
    /// "high" when the oracle answered, "low" for the local fallback.
    pub confidence: String,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
    pub validation_time_ms: u64,
}

/// Mutable record of one task execution, owned exclusively by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    pub task_id: String,
    pub task_type: String,
    pub tenant_id: String,
    pub agent_id: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub execution_time_ms: u64,
    pub output: String,
    pub error: Option<String>,
    pub sandbox_result: Option<SandboxResult>,
    pub validation_result: Option<ValidationResult>,
}

impl Execution {
    pub fn new(execution_id: String, task: &Task) -> Self {
        Self {
            id: execution_id,
            task_id: task.id.clone(),
            task_type: task.task_type.clone(),
            tenant_id: task.tenant_id.clone(),
            agent_id: String::new(),
            status: ExecutionStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            execution_time_ms: 0,
            output: String::new(),
            error: None,
            sandbox_result: None,
            validation_result: None,
        }
    }

    /// Applies a status transition, enforcing the partial order.
    ///
    /// Returns false (and leaves the record untouched) when the record is
    /// already terminal or the transition would regress. Entering a terminal
    /// state stamps `end_time` and `execution_time_ms`.
    pub fn transition(&mut self, next: ExecutionStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let allowed = match (self.status, next) {
            (ExecutionStatus::Pending, ExecutionStatus::Running) => true,
            (ExecutionStatus::Pending, s) if s.is_terminal() => true,
            (ExecutionStatus::Running, s) if s.is_terminal() => true,
            _ => false,
        };
        if !allowed {
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            let now = Utc::now();
            self.end_time = Some(now);
            self.execution_time_ms = (now - self.start_time).num_milliseconds().max(0) as u64;
        }
        true
    }
}

/// Per-submission options carried from the interface boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
    pub validate_output: bool,
    /// Accepted and recorded; file collection is a reserved extension point.
    pub return_files: bool,
}

/// Immediate acknowledgement returned by submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub execution_id: String,
    pub status: ExecutionStatus,
}

/// Filter applied by the list operation before pagination.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<ExecutionStatus>,
    pub task_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
    /// Zero means "all remaining" past the offset.
    pub limit: usize,
    pub offset: usize,
}

impl ListFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn page(limit: usize, offset: usize) -> Self {
        Self {
            limit,
            offset,
            ..Default::default()
        }
    }
}

/// Context handed to agents alongside the task; a pass-through of caller
/// metadata with documented defaults.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub project_type: String,
    pub tech_stack: Vec<String>,
    pub requirements: Vec<String>,
    pub constraints: Vec<String>,
    pub architecture: String,
}

impl AgentContext {
    pub fn from_task(task: &Task) -> Self {
        let split = |key: &str| -> Vec<String> {
            task.metadata
                .get(key)
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default()
        };
        Self {
            project_type: task
                .metadata
                .get("project_type")
                .cloned()
                .unwrap_or_else(|| "service".to_string()),
            tech_stack: split("tech_stack"),
            requirements: split("requirements"),
            constraints: split("constraints"),
            architecture: task
                .metadata
                .get("architecture")
                .cloned()
                .unwrap_or_else(|| "single-service".to_string()),
        }
    }
}
