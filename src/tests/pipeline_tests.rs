//! End-to-end pipeline scenarios: status lifecycle, timeout handling,
//! concurrency bounds, and output composition.

use super::support::{codegen_task, executor_with, wait_terminal, wait_terminal_within};
use crate::{
    models::{ExecOptions, ExecutionStatus, SandboxResult, Task},
    sandbox::{MockSandbox, SandboxRequest, SandboxRunner},
    ForgeError, Result,
};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn codegen_task_completes_with_validation() {
    let executor = executor_with(4, Arc::new(MockSandbox::new()));
    let receipt = executor
        .submit(
            codegen_task("t1", "acme"),
            ExecOptions {
                validate_output: true,
                return_files: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(receipt.status, ExecutionStatus::Pending);

    let exec = wait_terminal(&executor, &receipt.execution_id, "acme").await;
    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert!(exec.output.starts_with("Generated Go code for:"));
    assert_eq!(exec.sandbox_result.as_ref().unwrap().exit_code, 0);
    assert!(exec.validation_result.unwrap().passed);
    assert!(exec.end_time.is_some());
}

#[tokio::test]
async fn unknown_task_type_is_accepted_then_fails() {
    let executor = executor_with(4, Arc::new(MockSandbox::new()));
    let task = Task::new("t2", "unknown", "mystery job").with_tenant("acme");

    let receipt = executor.submit(task, ExecOptions::default()).await.unwrap();
    let exec = wait_terminal(&executor, &receipt.execution_id, "acme").await;

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert!(exec
        .error
        .unwrap()
        .contains("unsupported task type"));
}

#[tokio::test]
async fn slow_sandbox_job_times_out_with_exit_124() {
    let sandbox = Arc::new(MockSandbox::new().with_delay(Duration::from_secs(30)));
    let executor = executor_with(4, sandbox);
    let task = Task::new("t3", "codegen", "sleep forever")
        .with_tenant("acme")
        .with_language("bash")
        .with_code("sleep 10")
        .with_timeout(1);

    let started = std::time::Instant::now();
    let receipt = executor.submit(task, ExecOptions::default()).await.unwrap();
    let exec =
        wait_terminal_within(&executor, &receipt.execution_id, "acme", Duration::from_secs(4))
            .await;

    assert_eq!(exec.status, ExecutionStatus::Timeout);
    let sandbox_result = exec.sandbox_result.unwrap();
    assert_eq!(sandbox_result.exit_code, 124);
    assert!(sandbox_result.stderr.contains("timed out"));
    assert!(started.elapsed() <= Duration::from_secs(4));
}

#[tokio::test]
async fn sandbox_failure_marks_the_execution_failed() {
    struct FailingSandbox;

    #[async_trait]
    impl SandboxRunner for FailingSandbox {
        async fn run(
            &self,
            _request: SandboxRequest,
            _cancel: CancellationToken,
        ) -> Result<SandboxResult> {
            Err(ForgeError::Sandbox {
                message: "container wait failed: connection reset".to_string(),
            })
        }

        async fn cleanup(&self) {}
    }

    let executor = executor_with(2, Arc::new(FailingSandbox));
    let receipt = executor
        .submit(codegen_task("t8", "acme"), ExecOptions::default())
        .await
        .unwrap();
    let exec = wait_terminal(&executor, &receipt.execution_id, "acme").await;

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert!(exec.error.unwrap().contains("container wait failed"));
    assert!(exec.sandbox_result.is_none());
}

#[tokio::test]
async fn nonzero_exit_surfaces_stderr_in_the_output() {
    let sandbox = Arc::new(MockSandbox::with_results(vec![SandboxResult::new(
        2,
        String::new(),
        "compile error: undefined symbol".to_string(),
        7,
    )]));
    let executor = executor_with(4, sandbox);

    let receipt = executor
        .submit(codegen_task("t4", "acme"), ExecOptions::default())
        .await
        .unwrap();
    let exec = wait_terminal(&executor, &receipt.execution_id, "acme").await;

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert!(exec.output.contains("Execution Failed (exit code 2)"));
    assert!(exec.output.contains("compile error: undefined symbol"));
}

#[tokio::test]
async fn successful_run_appends_stdout_section() {
    let executor = executor_with(4, Arc::new(MockSandbox::new()));

    let receipt = executor
        .submit(codegen_task("t5", "acme"), ExecOptions::default())
        .await
        .unwrap();
    let exec = wait_terminal(&executor, &receipt.execution_id, "acme").await;

    assert!(exec.output.contains("--- Execution Output ---"));
    assert!(exec.output.contains("executed go program"));
}

#[tokio::test]
async fn running_count_never_exceeds_the_concurrency_cap() {
    let sandbox = Arc::new(MockSandbox::new().with_delay(Duration::from_millis(150)));
    let executor = executor_with(3, sandbox);

    let mut ids = Vec::new();
    for i in 0..12 {
        let receipt = executor
            .submit(codegen_task(&format!("t{i}"), "acme"), ExecOptions::default())
            .await
            .unwrap();
        ids.push(receipt.execution_id);
    }

    let watcher = {
        let executor = executor.clone();
        tokio::spawn(async move {
            let mut peak = 0;
            for _ in 0..100 {
                peak = peak.max(executor.running_count().await);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            peak
        })
    };

    for id in &ids {
        let exec = wait_terminal(&executor, id, "acme").await;
        assert!(exec.status.is_terminal());
    }

    let peak = watcher.await.unwrap();
    assert!(peak <= 3, "observed {peak} concurrent running executions");
    assert!(peak >= 1);
}

#[tokio::test]
async fn executions_survive_in_the_index_after_completion() {
    let executor = executor_with(2, Arc::new(MockSandbox::new()));
    let receipt = executor
        .submit(codegen_task("t6", "acme"), ExecOptions::default())
        .await
        .unwrap();
    wait_terminal(&executor, &receipt.execution_id, "acme").await;

    // A later fetch still sees the terminal record, unchanged.
    let first = executor.get(&receipt.execution_id, "acme").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = executor.get(&receipt.execution_id, "acme").await.unwrap();
    assert_eq!(first.status, second.status);
    assert_eq!(first.end_time, second.end_time);
    assert_eq!(first.output, second.output);
}

#[tokio::test]
async fn observe_delivers_snapshots_until_terminal() {
    use futures::StreamExt;

    let sandbox = Arc::new(MockSandbox::new().with_delay(Duration::from_millis(50)));
    let executor = executor_with(2, sandbox);
    let receipt = executor
        .submit(codegen_task("t7", "acme"), ExecOptions::default())
        .await
        .unwrap();

    let stream = executor.observe(&receipt.execution_id, "acme").await.unwrap();
    let snapshots: Vec<_> = stream.collect().await;

    assert!(!snapshots.is_empty());
    let last = snapshots.last().unwrap();
    assert!(last.status.is_terminal());
    // Only the final snapshot is terminal.
    for snapshot in &snapshots[..snapshots.len() - 1] {
        assert!(!snapshot.status.is_terminal());
    }
}

#[tokio::test]
async fn observe_unknown_execution_is_not_found() {
    let executor = executor_with(2, Arc::new(MockSandbox::new()));
    assert!(executor.observe("missing", "acme").await.is_err());
}
