//! Asynchronous task execution pipeline.
//!
//! The executor accepts tasks, assigns execution ids, and drives each one
//! through a bounded worker pool: agent production, an optional sandboxed
//! run of the produced code, and an optional validation pass. All state
//! lives in the in-memory [`ExecutionIndex`]; nothing is persisted across
//! process restarts.

pub mod index;

pub use index::ExecutionIndex;

use crate::{
    agents::AgentFactory,
    config::ExecutorConfig,
    constants::OBSERVE_POLL_INTERVAL_MS,
    models::{
        AgentContext, ExecOptions, Execution, ExecutionStatus, ListFilter, SubmitReceipt, Task,
    },
    sandbox::{SandboxRequest, SandboxRunner},
    validator::ValidationOracle,
    ForgeError, Result,
};
use futures::Stream;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Extra time granted to the outer worker guard beyond the execution budget;
/// the sandbox enforces the wall clock itself and reports the 124 sentinel,
/// so the guard only catches agent-phase overruns.
const CHAIN_GUARD_GRACE: Duration = Duration::from_secs(2);

pub struct TaskExecutor {
    config: ExecutorConfig,
    index: ExecutionIndex,
    factory: Arc<AgentFactory>,
    sandbox: Arc<dyn SandboxRunner>,
    validator: Arc<dyn ValidationOracle>,
    permits: Arc<Semaphore>,
    cancellations: Arc<RwLock<HashMap<String, CancellationToken>>>,
    root_token: CancellationToken,
}

#[derive(Clone, Copy)]
enum ObservePhase {
    First,
    Polling,
    Done,
}

impl TaskExecutor {
    pub fn new(
        config: ExecutorConfig,
        factory: Arc<AgentFactory>,
        sandbox: Arc<dyn SandboxRunner>,
        validator: Arc<dyn ValidationOracle>,
    ) -> Arc<Self> {
        let permits = Arc::new(Semaphore::new(config.max_concurrent));
        Arc::new(Self {
            config,
            index: ExecutionIndex::new(),
            factory,
            sandbox,
            validator,
            permits,
            cancellations: Arc::new(RwLock::new(HashMap::new())),
            root_token: CancellationToken::new(),
        })
    }

    /// Validates the task, inserts a pending execution, and starts one
    /// asynchronous worker. Returns immediately; scheduling cannot fail.
    pub async fn submit(
        self: &Arc<Self>,
        mut task: Task,
        options: ExecOptions,
    ) -> Result<SubmitReceipt> {
        if task.id.trim().is_empty() {
            return Err(ForgeError::InvalidInput("task.id is required".to_string()));
        }
        if task.task_type.trim().is_empty() {
            return Err(ForgeError::InvalidInput(
                "task.taskType is required".to_string(),
            ));
        }
        if task.description.trim().is_empty() {
            return Err(ForgeError::InvalidInput(
                "task.description is required".to_string(),
            ));
        }
        if task.tenant_id.trim().is_empty() {
            return Err(ForgeError::InvalidInput(
                "tenant id is required".to_string(),
            ));
        }

        let requested = task
            .timeout_seconds
            .unwrap_or(self.config.default_timeout_secs);
        task.timeout_seconds = Some(requested.min(self.config.max_timeout_secs).max(1));

        let execution_id = Uuid::new_v4().to_string();
        let execution = Execution::new(execution_id.clone(), &task);
        self.index.insert(execution).await;

        let token = self.root_token.child_token();
        self.cancellations
            .write()
            .await
            .insert(execution_id.clone(), token.clone());

        info!(
            execution_id,
            task_id = %task.id,
            task_type = %task.task_type,
            tenant_id = %task.tenant_id,
            "task submitted"
        );

        let executor = Arc::clone(self);
        let worker_id = execution_id.clone();
        tokio::spawn(async move {
            executor.run_task(task, worker_id, options, token).await;
        });

        Ok(SubmitReceipt {
            execution_id,
            status: ExecutionStatus::Pending,
        })
    }

    pub async fn get(&self, execution_id: &str, tenant_id: &str) -> Result<Execution> {
        self.index.get(execution_id, tenant_id).await
    }

    pub async fn list(&self, tenant_id: &str, filter: &ListFilter) -> (Vec<Execution>, usize) {
        self.index.list(tenant_id, filter).await
    }

    /// Marks the execution canceled and requests cooperative cancellation of
    /// any sandbox job it launched. Rejects terminal executions.
    pub async fn cancel(&self, execution_id: &str, tenant_id: &str) -> Result<()> {
        self.index.cancel(execution_id, tenant_id).await?;
        if let Some(token) = self.cancellations.read().await.get(execution_id) {
            token.cancel();
        }
        info!(execution_id, "execution canceled");
        Ok(())
    }

    /// Snapshot stream for one execution: the current record immediately,
    /// then one frame per poll interval until a terminal state has been
    /// delivered. All observers read the same authoritative record.
    pub async fn observe(
        &self,
        execution_id: &str,
        tenant_id: &str,
    ) -> Result<impl Stream<Item = Execution> + Send + 'static> {
        self.index.get(execution_id, tenant_id).await?;

        let index = self.index.clone();
        let id = execution_id.to_string();
        let tenant = tenant_id.to_string();
        let interval = Duration::from_millis(OBSERVE_POLL_INTERVAL_MS);

        Ok(futures::stream::unfold(
            ObservePhase::First,
            move |phase| {
                let index = index.clone();
                let id = id.clone();
                let tenant = tenant.clone();
                async move {
                    match phase {
                        ObservePhase::Done => None,
                        ObservePhase::First | ObservePhase::Polling => {
                            if matches!(phase, ObservePhase::Polling) {
                                tokio::time::sleep(interval).await;
                            }
                            let snapshot = index.get(&id, &tenant).await.ok()?;
                            let next = if snapshot.status.is_terminal() {
                                ObservePhase::Done
                            } else {
                                ObservePhase::Polling
                            };
                            Some((snapshot, next))
                        }
                    }
                }
            },
        ))
    }

    /// Flips all non-terminal executions to canceled, then drains the worker
    /// pool, waiting up to `grace` for busy permits before forcing return.
    /// Terminal records stay in the index until process exit.
    pub async fn shutdown(&self, grace: Duration) {
        let flipped = self.index.cancel_all_non_terminal().await;
        info!(canceled = flipped.len(), "executor shutting down");
        self.root_token.cancel();

        let all_permits = self.config.max_concurrent as u32;
        match tokio::time::timeout(grace, self.permits.clone().acquire_many_owned(all_permits))
            .await
        {
            Ok(Ok(_permits)) => info!("worker pool drained"),
            Ok(Err(_)) => warn!("worker pool closed during drain"),
            Err(_) => warn!(
                grace_secs = grace.as_secs(),
                "shutdown grace elapsed before the worker pool drained"
            ),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent
    }

    pub async fn running_count(&self) -> usize {
        self.index.running_count().await
    }

    fn effective_timeout(&self, task: &Task) -> Duration {
        let secs = task
            .timeout_seconds
            .unwrap_or(self.config.default_timeout_secs)
            .min(self.config.max_timeout_secs)
            .max(1);
        Duration::from_secs(secs)
    }

    async fn remove_cancellation(&self, execution_id: &str) {
        self.cancellations.write().await.remove(execution_id);
    }

    /// Worker body; holds one concurrency permit for its whole lifespan.
    async fn run_task(
        self: Arc<Self>,
        task: Task,
        execution_id: String,
        options: ExecOptions,
        token: CancellationToken,
    ) {
        let permit = tokio::select! {
            _ = token.cancelled() => None,
            acquired = self.permits.clone().acquire_owned() => acquired.ok(),
        };
        let Some(_permit) = permit else {
            self.index
                .transition(&execution_id, ExecutionStatus::Canceled)
                .await;
            self.remove_cancellation(&execution_id).await;
            return;
        };

        if !self
            .index
            .transition(&execution_id, ExecutionStatus::Running)
            .await
        {
            // Canceled while waiting for a slot.
            self.remove_cancellation(&execution_id).await;
            return;
        }

        let budget = self.effective_timeout(&task);
        let deadline = Instant::now() + budget;
        debug!(execution_id, timeout_secs = budget.as_secs(), "execution running");

        let outcome = tokio::time::timeout(
            budget + CHAIN_GUARD_GRACE,
            self.execute_chain(&task, &execution_id, options, deadline, &token),
        )
        .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(ForgeError::Canceled)) => {
                // cancel() stamped the terminal state already; this is a
                // no-op in that case.
                self.index
                    .transition(&execution_id, ExecutionStatus::Canceled)
                    .await;
            }
            Ok(Err(e)) => {
                warn!(execution_id, error = %e, "execution failed");
                self.index.fail(&execution_id, e.to_string()).await;
            }
            Err(_elapsed) => {
                self.index
                    .update(&execution_id, |exec| {
                        exec.error = Some("execution deadline exceeded".to_string());
                    })
                    .await;
                self.index
                    .transition(&execution_id, ExecutionStatus::Timeout)
                    .await;
            }
        }

        self.remove_cancellation(&execution_id).await;
    }

    /// The agent → sandbox → validation chain for one execution.
    async fn execute_chain(
        &self,
        task: &Task,
        execution_id: &str,
        options: ExecOptions,
        deadline: Instant,
        token: &CancellationToken,
    ) -> Result<()> {
        let agent = self.factory.agent_for(&task.task_type)?;
        let ctx = AgentContext::from_task(task);
        let produced = agent.produce(task, &ctx).await?;

        let agent_id = AgentFactory::agent_id(&task.task_type);
        let summary = produced.output.clone();
        self.index
            .update(execution_id, |exec| {
                exec.agent_id = agent_id;
                exec.output = summary;
            })
            .await;

        let language = produced.language.clone().or_else(|| task.language.clone());
        let artifact = produced
            .code
            .clone()
            .unwrap_or_else(|| produced.output.clone());

        if let Some(code) = produced.code.as_ref().filter(|c| !c.trim().is_empty()) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let request = SandboxRequest::derived(task, code.clone(), language.clone(), remaining);
            let sandbox_result = self.sandbox.run(request, token.child_token()).await?;

            let timed_out = sandbox_result.is_timeout();
            let section = if sandbox_result.exit_code == 0 {
                format!("\n\n--- Execution Output ---\n{}", sandbox_result.stdout)
            } else if timed_out {
                format!("\n\n--- Execution Timed Out ---\n{}", sandbox_result.stderr)
            } else {
                format!(
                    "\n\n--- Execution Failed (exit code {}) ---\n{}",
                    sandbox_result.exit_code, sandbox_result.stderr
                )
            };
            self.index
                .update(execution_id, |exec| {
                    exec.output.push_str(&section);
                    exec.sandbox_result = Some(sandbox_result);
                })
                .await;

            if timed_out {
                self.index
                    .transition(execution_id, ExecutionStatus::Timeout)
                    .await;
                return Ok(());
            }
        }

        if options.validate_output {
            let language_label = language.as_deref().unwrap_or("text").to_string();
            let validation = self
                .validator
                .validate(&artifact, &language_label, &task.task_type)
                .await;
            self.index
                .update(execution_id, |exec| {
                    exec.validation_result = Some(validation);
                })
                .await;
        }

        self.index
            .transition(execution_id, ExecutionStatus::Completed)
            .await;
        Ok(())
    }
}
