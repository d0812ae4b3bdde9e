use crate::{
    models::{Execution, ExecutionStatus, ListFilter},
    ForgeError, Result,
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory execution map, the single authority on execution state.
///
/// Keyed by execution id and guarded by one readers-writer lock. Lookups
/// besides the id are tenant-scoped only; a tenant mismatch is reported as
/// NotFound so ids cannot be probed across tenants. Lock hold times cover
/// only the mutation itself, never I/O.
#[derive(Clone, Default)]
pub struct ExecutionIndex {
    inner: Arc<RwLock<HashMap<String, Execution>>>,
}

impl ExecutionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, execution: Execution) {
        let mut map = self.inner.write().await;
        map.insert(execution.id.clone(), execution);
    }

    pub async fn get(&self, execution_id: &str, tenant_id: &str) -> Result<Execution> {
        let map = self.inner.read().await;
        map.get(execution_id)
            .filter(|exec| exec.tenant_id == tenant_id)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("execution {execution_id}")))
    }

    /// Scans the tenant's executions, returning the filtered page and the
    /// total before pagination. `limit == 0` means all remaining past the
    /// offset; the window is clamped to the result bounds.
    pub async fn list(&self, tenant_id: &str, filter: &ListFilter) -> (Vec<Execution>, usize) {
        let map = self.inner.read().await;
        let mut matches: Vec<Execution> = map
            .values()
            .filter(|exec| exec.tenant_id == tenant_id)
            .filter(|exec| filter.status.map_or(true, |s| exec.status == s))
            .filter(|exec| {
                filter
                    .task_type
                    .as_deref()
                    .map_or(true, |t| exec.task_type.eq_ignore_ascii_case(t))
            })
            .filter(|exec| filter.since.map_or(true, |since| exec.start_time >= since))
            .cloned()
            .collect();
        drop(map);

        matches.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(a.id.cmp(&b.id)));
        let total = matches.len();

        let start = filter.offset.min(total);
        let end = if filter.limit == 0 {
            total
        } else {
            filter.offset.saturating_add(filter.limit).min(total)
        };
        (matches.drain(start..end).collect(), total)
    }

    /// Applies a status transition; returns false when the record is missing,
    /// already terminal, or the transition would regress.
    pub async fn transition(&self, execution_id: &str, next: ExecutionStatus) -> bool {
        let mut map = self.inner.write().await;
        match map.get_mut(execution_id) {
            Some(exec) => {
                let applied = exec.transition(next);
                if applied {
                    debug!(execution_id, status = %next, "execution transitioned");
                }
                applied
            }
            None => false,
        }
    }

    /// Mutates a non-terminal record in place. Terminal records are frozen
    /// and the closure is not invoked for them.
    pub async fn update<F>(&self, execution_id: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut Execution),
    {
        let mut map = self.inner.write().await;
        match map.get_mut(execution_id) {
            Some(exec) if !exec.status.is_terminal() => {
                mutate(exec);
                true
            }
            _ => false,
        }
    }

    /// Records the error and moves the execution to `failed` atomically.
    pub async fn fail(&self, execution_id: &str, error: String) -> bool {
        let mut map = self.inner.write().await;
        match map.get_mut(execution_id) {
            Some(exec) if !exec.status.is_terminal() => {
                exec.error = Some(error);
                exec.transition(ExecutionStatus::Failed)
            }
            _ => false,
        }
    }

    /// Tenant-checked cancel; rejects terminal records with InvalidState.
    pub async fn cancel(&self, execution_id: &str, tenant_id: &str) -> Result<()> {
        let mut map = self.inner.write().await;
        let exec = map
            .get_mut(execution_id)
            .filter(|exec| exec.tenant_id == tenant_id)
            .ok_or_else(|| ForgeError::NotFound(format!("execution {execution_id}")))?;
        if exec.status.is_terminal() {
            return Err(ForgeError::InvalidState(format!(
                "execution {execution_id} is already {}",
                exec.status
            )));
        }
        exec.transition(ExecutionStatus::Canceled);
        Ok(())
    }

    /// Flips every non-terminal record to `canceled`; used by shutdown.
    pub async fn cancel_all_non_terminal(&self) -> Vec<String> {
        let mut map = self.inner.write().await;
        let mut flipped = Vec::new();
        for exec in map.values_mut() {
            if !exec.status.is_terminal() && exec.transition(ExecutionStatus::Canceled) {
                flipped.push(exec.id.clone());
            }
        }
        flipped
    }

    pub async fn running_count(&self) -> usize {
        let map = self.inner.read().await;
        map.values()
            .filter(|exec| exec.status == ExecutionStatus::Running)
            .count()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
