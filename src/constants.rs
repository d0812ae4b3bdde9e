//! System-wide constants and defaults for the execution pipeline.

// Completion oracle
/// Anthropic-compatible API version header sent by the completion client.
pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Deadline for a single completion request; agents fall back to templates
/// when it is exceeded.
pub const ORACLE_REQUEST_TIMEOUT_SECS: u64 = 30;

// Executor
/// Global concurrency cap: executions holding a permit at the same time.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Default wall-clock budget for the full agent + sandbox + validation chain.
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;

/// Hard ceiling on any caller-supplied `timeoutSeconds`.
pub const MAX_TASK_TIMEOUT_SECS: u64 = 600;

/// Grace period granted to shutdown permit draining before forcing return.
pub const SHUTDOWN_GRACE_SECS: u64 = 30;

/// Cadence of observe status frames.
pub const OBSERVE_POLL_INTERVAL_MS: u64 = 1000;

/// Default page size for listing when the caller does not supply one.
pub const DEFAULT_LIST_LIMIT: usize = 50;

// Sandbox
/// Exit code reported when the container outlives its wall-clock budget.
pub const SANDBOX_TIMEOUT_EXIT_CODE: i64 = 124;

/// Stderr sentinel attached to a timed-out sandbox result.
pub const SANDBOX_TIMEOUT_STDERR: &str = "Execution timed out";

/// Mount point of the per-job workspace inside the container.
pub const SANDBOX_WORKSPACE_MOUNT: &str = "/workspace";

pub const DEFAULT_SANDBOX_MEMORY_MB: i64 = 256;
pub const DEFAULT_SANDBOX_CPU_MILLIS: i64 = 500;
pub const DEFAULT_SANDBOX_DISK_MB: i64 = 1024;

/// Size of the writable tmpfs mounted at /tmp.
pub const SANDBOX_TMPFS_MB: i64 = 100;

/// CFS scheduling period; quota = millicores * 100 against this period.
pub const SANDBOX_CPU_PERIOD_MICROS: i64 = 100_000;

/// Process count cap inside a sandbox container.
pub const SANDBOX_PIDS_LIMIT: i64 = 256;

/// Time allowed for draining trailing log frames after container exit.
pub const SANDBOX_LOG_DRAIN_MS: u64 = 250;

/// Deadline for cleanup to cancel and remove all active jobs.
pub const SANDBOX_CLEANUP_TIMEOUT_SECS: u64 = 30;
