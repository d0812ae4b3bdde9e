//! Shared doubles and builders for pipeline tests.

use crate::{
    agents::AgentFactory,
    completion::CompletionOracle,
    config::ExecutorConfig,
    executor::TaskExecutor,
    models::{Execution, Task, ValidationResult},
    sandbox::SandboxRunner,
    validator::ValidationOracle,
    ForgeError, Result,
};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};

/// Oracle that always fails, forcing agents onto their template fallback.
pub struct OfflineOracle;

#[async_trait]
impl CompletionOracle for OfflineOracle {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(ForgeError::Completion("oracle offline".to_string()))
    }
}

/// Validator double that always passes with high confidence.
pub struct PassingValidator;

#[async_trait]
impl ValidationOracle for PassingValidator {
    async fn validate(&self, _code: &str, _language: &str, _task_type: &str) -> ValidationResult {
        ValidationResult {
            overall_score: 90.0,
            security_score: 90.0,
            quality_score: 90.0,
            passed: true,
            confidence: "high".to_string(),
            validation_time_ms: 1,
            ..Default::default()
        }
    }
}

pub fn executor_with(
    max_concurrent: usize,
    sandbox: Arc<dyn SandboxRunner>,
) -> Arc<TaskExecutor> {
    let config = ExecutorConfig {
        max_concurrent,
        default_timeout_secs: 10,
        max_timeout_secs: 20,
    };
    TaskExecutor::new(
        config,
        Arc::new(AgentFactory::new(Arc::new(OfflineOracle))),
        sandbox,
        Arc::new(PassingValidator),
    )
}

pub fn codegen_task(id: &str, tenant: &str) -> Task {
    Task::new(id, "codegen", "hello service")
        .with_tenant(tenant)
        .with_language("go")
}

/// Polls until the execution reaches a terminal state or the deadline
/// elapses.
pub async fn wait_terminal(
    executor: &Arc<TaskExecutor>,
    execution_id: &str,
    tenant_id: &str,
) -> Execution {
    wait_terminal_within(executor, execution_id, tenant_id, Duration::from_secs(5)).await
}

pub async fn wait_terminal_within(
    executor: &Arc<TaskExecutor>,
    execution_id: &str,
    tenant_id: &str,
    deadline: Duration,
) -> Execution {
    let started = std::time::Instant::now();
    loop {
        let exec = executor
            .get(execution_id, tenant_id)
            .await
            .expect("execution should exist");
        if exec.status.is_terminal() {
            return exec;
        }
        if started.elapsed() > deadline {
            panic!("execution {execution_id} still {:?} after {deadline:?}", exec.status);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
