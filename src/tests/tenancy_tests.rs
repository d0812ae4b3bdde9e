//! Tenant isolation, cancellation, and graceful-shutdown scenarios.

use super::support::{codegen_task, executor_with, wait_terminal};
use crate::{
    models::{ExecOptions, ExecutionStatus, ListFilter},
    sandbox::MockSandbox,
    ForgeError,
};
use std::{sync::Arc, time::Duration};

#[tokio::test]
async fn lookups_are_scoped_to_the_owning_tenant() {
    let executor = executor_with(4, Arc::new(MockSandbox::new()));

    let a1 = executor
        .submit(codegen_task("a1", "tenant-a"), ExecOptions::default())
        .await
        .unwrap();
    let a2 = executor
        .submit(codegen_task("a2", "tenant-a"), ExecOptions::default())
        .await
        .unwrap();
    let b1 = executor
        .submit(codegen_task("b1", "tenant-b"), ExecOptions::default())
        .await
        .unwrap();

    for id in [&a1.execution_id, &a2.execution_id] {
        wait_terminal(&executor, id, "tenant-a").await;
    }
    wait_terminal(&executor, &b1.execution_id, "tenant-b").await;

    let (a_execs, a_total) = executor.list("tenant-a", &ListFilter::all()).await;
    assert_eq!(a_total, 2);
    assert!(a_execs.iter().all(|e| e.tenant_id == "tenant-a"));

    let (b_execs, b_total) = executor.list("tenant-b", &ListFilter::all()).await;
    assert_eq!(b_total, 1);
    assert_eq!(b_execs[0].task_id, "b1");

    // Cross-tenant fetch is indistinguishable from a missing id.
    let err = executor.get(&b1.execution_id, "tenant-a").await.unwrap_err();
    assert!(matches!(err, ForgeError::NotFound(_)));
}

#[tokio::test]
async fn cancel_of_a_running_execution_reaches_canceled_quickly() {
    let sandbox = Arc::new(MockSandbox::new().with_delay(Duration::from_secs(15)));
    let executor = executor_with(2, sandbox);

    let receipt = executor
        .submit(
            codegen_task("t5", "acme").with_timeout(20),
            ExecOptions::default(),
        )
        .await
        .unwrap();

    // Wait for the worker to pick the task up.
    for _ in 0..100 {
        let exec = executor.get(&receipt.execution_id, "acme").await.unwrap();
        if exec.status == ExecutionStatus::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let started = std::time::Instant::now();
    executor.cancel(&receipt.execution_id, "acme").await.unwrap();

    let exec = executor.get(&receipt.execution_id, "acme").await.unwrap();
    assert_eq!(exec.status, ExecutionStatus::Canceled);
    assert!(exec.end_time.is_some());
    assert!(started.elapsed() < Duration::from_secs(2));

    // The record is frozen; the unwinding worker must not overwrite it.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let after = executor.get(&receipt.execution_id, "acme").await.unwrap();
    assert_eq!(after.status, ExecutionStatus::Canceled);
    assert_eq!(after.end_time, exec.end_time);
}

#[tokio::test]
async fn cancel_of_a_terminal_execution_is_invalid_state() {
    let executor = executor_with(2, Arc::new(MockSandbox::new()));
    let receipt = executor
        .submit(codegen_task("t1", "acme"), ExecOptions::default())
        .await
        .unwrap();
    wait_terminal(&executor, &receipt.execution_id, "acme").await;

    let err = executor
        .cancel(&receipt.execution_id, "acme")
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::InvalidState(_)));
}

#[tokio::test]
async fn shutdown_flips_everything_and_returns_within_grace() {
    let sandbox = Arc::new(MockSandbox::new().with_delay(Duration::from_secs(10)));
    let executor = executor_with(2, sandbox);

    let mut ids = Vec::new();
    for i in 0..5 {
        let receipt = executor
            .submit(
                codegen_task(&format!("t{i}"), "acme").with_timeout(15),
                ExecOptions::default(),
            )
            .await
            .unwrap();
        ids.push(receipt.execution_id);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = std::time::Instant::now();
    executor.shutdown(Duration::from_secs(3)).await;
    assert!(started.elapsed() <= Duration::from_secs(4));

    let (execs, total) = executor.list("acme", &ListFilter::all()).await;
    assert_eq!(total, 5);
    for exec in &execs {
        assert!(
            exec.status.is_terminal(),
            "execution {} still {:?} after shutdown",
            exec.id,
            exec.status
        );
    }
    assert_eq!(executor.running_count().await, 0);

    // Terminal records are preserved after shutdown.
    for id in &ids {
        assert!(executor.get(id, "acme").await.is_ok());
    }
}

#[tokio::test]
async fn list_since_filter_excludes_older_executions() {
    let executor = executor_with(4, Arc::new(MockSandbox::new()));

    let old = executor
        .submit(codegen_task("old", "acme"), ExecOptions::default())
        .await
        .unwrap();
    wait_terminal(&executor, &old.execution_id, "acme").await;

    let cutoff = chrono::Utc::now();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let fresh = executor
        .submit(codegen_task("fresh", "acme"), ExecOptions::default())
        .await
        .unwrap();
    wait_terminal(&executor, &fresh.execution_id, "acme").await;

    let (execs, total) = executor
        .list(
            "acme",
            &ListFilter {
                since: Some(cutoff),
                ..Default::default()
            },
        )
        .await;
    assert_eq!(total, 1);
    assert_eq!(execs[0].task_id, "fresh");
}
