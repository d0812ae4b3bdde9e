//! Container-backed sandbox built on the local OCI engine.

use super::{profile_for, SandboxRequest, SandboxRunner};
use crate::{
    config::SandboxConfig,
    constants::{
        SANDBOX_CLEANUP_TIMEOUT_SECS, SANDBOX_CPU_PERIOD_MICROS, SANDBOX_LOG_DRAIN_MS,
        SANDBOX_PIDS_LIMIT, SANDBOX_TMPFS_MB, SANDBOX_WORKSPACE_MOUNT,
    },
    models::{ResourceUsage, SandboxResult},
    ForgeError, Result,
};
use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, KillContainerOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, StatsOptions, WaitContainerOptions,
};
use bollard::models::HostConfig;
use bollard::Docker;
use futures::StreamExt;
use std::{
    collections::HashMap,
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{fs, sync::RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MEGABYTE: u64 = 1024 * 1024;

/// Supervises one container per job: create, start, follow logs, wait with a
/// wall-clock deadline, collect stats, and force-remove on every exit path.
pub struct DockerSandbox {
    docker: Docker,
    config: SandboxConfig,
    active_jobs: Arc<RwLock<HashMap<String, ActiveJob>>>,
}

struct ActiveJob {
    container_name: String,
    tenant_id: String,
    cancel: CancellationToken,
}

impl DockerSandbox {
    pub fn new(config: SandboxConfig) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| ForgeError::Sandbox {
            message: format!("failed to connect to container runtime: {e}"),
        })?;
        Ok(Self {
            docker,
            config,
            active_jobs: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub async fn active_job_count(&self) -> usize {
        self.active_jobs.read().await.len()
    }

    fn host_config(&self, request: &SandboxRequest, workdir: &Path) -> HostConfig {
        let limits = request.resource_limits.clone().unwrap_or_default();
        let memory_mb = limits.memory_mb.unwrap_or(self.config.default_memory_mb);
        let cpu_millis = limits.cpu_millis.unwrap_or(self.config.default_cpu_millis);
        let disk_mb = limits.disk_mb.unwrap_or(self.config.default_disk_mb);
        let network = limits.network_access.unwrap_or(false);
        let fs_rw = limits.filesystem_write.unwrap_or(false);
        let mount_mode = if fs_rw { "rw" } else { "ro" };

        HostConfig {
            memory: Some(memory_mb * 1024 * 1024),
            cpu_period: Some(SANDBOX_CPU_PERIOD_MICROS),
            cpu_quota: Some(cpu_millis * 100),
            network_mode: Some(if network { "bridge" } else { "none" }.to_string()),
            readonly_rootfs: Some(!fs_rw),
            binds: Some(vec![format!(
                "{}:{}:{}",
                workdir.display(),
                SANDBOX_WORKSPACE_MOUNT,
                mount_mode
            )]),
            tmpfs: Some(HashMap::from([(
                "/tmp".to_string(),
                format!("size={SANDBOX_TMPFS_MB}m"),
            )])),
            storage_opt: Some(HashMap::from([(
                "size".to_string(),
                format!("{disk_mb}M"),
            )])),
            pids_limit: Some(SANDBOX_PIDS_LIMIT),
            cap_drop: Some(vec!["ALL".to_string()]),
            security_opt: Some(vec!["no-new-privileges:true".to_string()]),
            ..Default::default()
        }
    }

    async fn execute_job(
        &self,
        job_id: &str,
        workdir: &Path,
        request: &SandboxRequest,
        cancel: &CancellationToken,
    ) -> Result<SandboxResult> {
        let profile = profile_for(request.language.as_deref(), &self.config.base_image);
        fs::write(workdir.join(profile.file_name), &request.code).await?;

        let container_name = format!("forge-sandbox-{job_id}");
        let container_config = ContainerConfig {
            image: Some(profile.image.clone()),
            cmd: Some(profile.command.clone()),
            working_dir: Some(SANDBOX_WORKSPACE_MOUNT.to_string()),
            tty: Some(false),
            labels: Some(HashMap::from([
                ("managed-by".to_string(), "forge-core".to_string()),
                ("forge.tenant".to_string(), request.tenant_id.clone()),
            ])),
            host_config: Some(self.host_config(request, workdir)),
            ..Default::default()
        };

        self.docker
            .create_container(
                Some(CreateContainerOptions {
                    name: container_name.as_str(),
                    platform: None,
                }),
                container_config,
            )
            .await
            .map_err(|e| ForgeError::Sandbox {
                message: format!("container create failed: {e}"),
            })?;

        {
            let mut jobs = self.active_jobs.write().await;
            jobs.insert(
                job_id.to_string(),
                ActiveJob {
                    container_name: container_name.clone(),
                    tenant_id: request.tenant_id.clone(),
                    cancel: cancel.clone(),
                },
            );
        }

        self.docker
            .start_container::<String>(&container_name, None)
            .await
            .map_err(|e| ForgeError::Sandbox {
                message: format!("container start failed: {e}"),
            })?;

        debug!(
            job_id,
            container = %container_name,
            image = %profile.image,
            tenant_id = %request.tenant_id,
            "sandbox container started"
        );

        self.supervise(job_id, &container_name, request, cancel)
            .await
    }

    /// Follows logs and races container exit against the deadline and the
    /// cancellation token.
    async fn supervise(
        &self,
        job_id: &str,
        container_name: &str,
        request: &SandboxRequest,
        cancel: &CancellationToken,
    ) -> Result<SandboxResult> {
        let mut logs = self
            .docker
            .logs(
                container_name,
                Some(LogsOptions::<String> {
                    follow: true,
                    stdout: true,
                    stderr: true,
                    ..Default::default()
                }),
            )
            .fuse();
        let mut waits = self
            .docker
            .wait_container(container_name, None::<WaitContainerOptions<String>>);

        let started = Instant::now();
        let deadline = tokio::time::sleep(request.timeout);
        tokio::pin!(deadline);

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut logs_done = false;

        let exit_code = loop {
            tokio::select! {
                frame = logs.next(), if !logs_done => match frame {
                    Some(Ok(LogOutput::StdOut { message })) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Some(Ok(LogOutput::StdErr { message })) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(job_id, error = %e, "log stream error, continuing with partial logs");
                    }
                    None => logs_done = true,
                },
                status = waits.next() => break match status {
                    Some(Ok(response)) => response.status_code,
                    Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => code,
                    Some(Err(e)) => {
                        warn!(job_id, error = %e, "container wait failed");
                        self.kill_container(container_name).await;
                        return Err(ForgeError::Sandbox {
                            message: format!("container wait failed: {e}"),
                        });
                    }
                    None => {
                        self.kill_container(container_name).await;
                        return Err(ForgeError::Sandbox {
                            message: "container wait stream closed without a status".to_string(),
                        });
                    }
                },
                _ = &mut deadline => {
                    info!(job_id, timeout_secs = request.timeout.as_secs(), "sandbox wall clock exceeded, killing container");
                    self.kill_container(container_name).await;
                    return Ok(SandboxResult::timed_out(
                        stdout,
                        started.elapsed().as_millis() as u64,
                    ));
                }
                _ = cancel.cancelled() => {
                    info!(job_id, "sandbox job canceled, killing container");
                    self.kill_container(container_name).await;
                    return Err(ForgeError::Canceled);
                }
            }
        };

        if !logs_done {
            let _ = tokio::time::timeout(Duration::from_millis(SANDBOX_LOG_DRAIN_MS), async {
                while let Some(frame) = logs.next().await {
                    match frame {
                        Ok(LogOutput::StdOut { message }) => {
                            stdout.push_str(&String::from_utf8_lossy(&message));
                        }
                        Ok(LogOutput::StdErr { message }) => {
                            stderr.push_str(&String::from_utf8_lossy(&message));
                        }
                        _ => {}
                    }
                }
            })
            .await;
        }

        let mut result = SandboxResult::new(
            exit_code,
            stdout,
            stderr,
            started.elapsed().as_millis() as u64,
        );
        result.resource_usage = self.collect_usage(container_name).await;

        debug!(
            job_id,
            exit_code,
            execution_time_ms = result.execution_time_ms,
            "sandbox job finished"
        );
        Ok(result)
    }

    /// One-shot stats read; missing metrics are zero, never an error.
    async fn collect_usage(&self, container_name: &str) -> ResourceUsage {
        let mut stream = self.docker.stats(
            container_name,
            Some(StatsOptions {
                stream: false,
                one_shot: true,
            }),
        );
        let stats = match stream.next().await {
            Some(Ok(stats)) => stats,
            Some(Err(e)) => {
                debug!(container = container_name, error = %e, "stats read failed, reporting zeroed usage");
                return ResourceUsage::default();
            }
            None => return ResourceUsage::default(),
        };

        let (disk_read, disk_write) = stats
            .blkio_stats
            .io_service_bytes_recursive
            .unwrap_or_default()
            .iter()
            .fold((0u64, 0u64), |(read, write), entry| {
                match entry.op.to_lowercase().as_str() {
                    "read" => (read + entry.value, write),
                    "write" => (read, write + entry.value),
                    _ => (read, write),
                }
            });

        let (network_rx, network_tx) = stats
            .networks
            .unwrap_or_default()
            .values()
            .next()
            .map(|iface| (iface.rx_bytes, iface.tx_bytes))
            .unwrap_or((0, 0));

        ResourceUsage {
            cpu_time_ms: stats.cpu_stats.cpu_usage.total_usage / 1_000_000,
            peak_memory_mb: stats.memory_stats.max_usage.unwrap_or(0) / MEGABYTE,
            disk_read_mb: disk_read / MEGABYTE,
            disk_write_mb: disk_write / MEGABYTE,
            network_rx_mb: network_rx / MEGABYTE,
            network_tx_mb: network_tx / MEGABYTE,
        }
    }

    async fn kill_container(&self, container_name: &str) {
        if let Err(e) = self
            .docker
            .kill_container(container_name, Some(KillContainerOptions { signal: "SIGKILL" }))
            .await
        {
            debug!(container = container_name, error = %e, "kill failed, container may have exited");
        }
    }

    async fn remove_container(&self, container_name: &str) {
        if let Err(e) = self
            .docker
            .remove_container(
                container_name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            debug!(container = container_name, error = %e, "container removal failed");
        }
    }

    /// Removes the active-job entry, its container, and its workspace.
    async fn release_job(&self, job_id: &str, workdir: &Path) {
        let job = { self.active_jobs.write().await.remove(job_id) };
        if let Some(job) = job {
            self.remove_container(&job.container_name).await;
            debug!(job_id, tenant_id = %job.tenant_id, "sandbox job released");
        }
        if let Err(e) = fs::remove_dir_all(workdir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(job_id, error = %e, "failed to remove sandbox workspace");
            }
        }
    }
}

#[async_trait]
impl SandboxRunner for DockerSandbox {
    async fn run(
        &self,
        request: SandboxRequest,
        cancel: CancellationToken,
    ) -> Result<SandboxResult> {
        let job_id = Uuid::new_v4().to_string();
        let workdir = self.config.workdir_root.join(&job_id);
        fs::create_dir_all(&workdir).await?;

        let result = self.execute_job(&job_id, &workdir, &request, &cancel).await;

        // Runs on every exit path, including errors from create and start.
        self.release_job(&job_id, &workdir).await;
        result
    }

    async fn cleanup(&self) {
        let jobs: Vec<ActiveJob> = {
            let mut map = self.active_jobs.write().await;
            map.drain().map(|(_, job)| job).collect()
        };
        if jobs.is_empty() {
            return;
        }
        info!(count = jobs.len(), "cleaning up active sandbox jobs");

        let removals = async {
            for job in &jobs {
                job.cancel.cancel();
                self.remove_container(&job.container_name).await;
            }
        };
        if tokio::time::timeout(Duration::from_secs(SANDBOX_CLEANUP_TIMEOUT_SECS), removals)
            .await
            .is_err()
        {
            warn!("sandbox cleanup exceeded its deadline");
        }
    }
}
