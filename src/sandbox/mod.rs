//! Isolated execution of generated code inside short-lived containers.
//!
//! [`SandboxRunner`] is the seam between the executor and the container
//! runtime: [`DockerSandbox`] is the production implementation and
//! [`MockSandbox`] an in-memory double for tests that must not require a
//! running engine.

pub mod docker;

pub use docker::DockerSandbox;

use crate::{
    models::{ResourceLimits, SandboxResult, Task},
    ForgeError, Result,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// One request to run a piece of generated code under resource caps.
#[derive(Debug, Clone)]
pub struct SandboxRequest {
    pub task_id: String,
    pub tenant_id: String,
    pub code: String,
    pub language: Option<String>,
    /// Wall-clock budget; exceeding it yields the exit-124 sentinel.
    pub timeout: Duration,
    pub resource_limits: Option<ResourceLimits>,
}

impl SandboxRequest {
    /// Derives a sandbox request from the submitted task and the artifact an
    /// agent produced for it.
    pub fn derived(task: &Task, code: String, language: Option<String>, timeout: Duration) -> Self {
        Self {
            task_id: task.id.clone(),
            tenant_id: task.tenant_id.clone(),
            code,
            language: language.or_else(|| task.language.clone()),
            timeout,
            resource_limits: task.resource_limits.clone(),
        }
    }
}

#[async_trait]
pub trait SandboxRunner: Send + Sync {
    /// Runs the request to completion, honoring the wall-clock budget and the
    /// cancellation token. The workspace and container are released on every
    /// exit path. Cancellation surfaces as [`ForgeError::Canceled`]; a
    /// deadline overrun is not an error but the exit-124 sentinel result.
    async fn run(&self, request: SandboxRequest, cancel: CancellationToken)
        -> Result<SandboxResult>;

    /// Cancels and removes all active jobs. Idempotent.
    async fn cleanup(&self);
}

/// Image and entry command for one supported language.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageProfile {
    pub image: String,
    pub file_name: &'static str,
    pub command: Vec<String>,
    /// False for the artifact-dump fallback, which never executes code.
    pub executes: bool,
}

/// Deterministic language-to-image mapping; unknown languages fall through to
/// the configured base image and an artifact dump.
pub fn profile_for(language: Option<&str>, base_image: &str) -> LanguageProfile {
    let run = |image: &str, file_name: &'static str, command: &[&str]| LanguageProfile {
        image: image.to_string(),
        file_name,
        command: command.iter().map(|s| s.to_string()).collect(),
        executes: true,
    };
    match language.map(|l| l.to_lowercase()).as_deref() {
        Some("go") | Some("golang") => {
            run("golang:1.21-alpine", "main.go", &["go", "run", "/workspace/main.go"])
        }
        Some("python") | Some("py") => run(
            "python:3.11-alpine",
            "main.py",
            &["python3", "/workspace/main.py"],
        ),
        Some("node") | Some("javascript") | Some("js") => {
            run("node:18-alpine", "main.js", &["node", "/workspace/main.js"])
        }
        Some("bash") | Some("shell") | Some("sh") => {
            run("alpine:latest", "main.sh", &["bash", "/workspace/main.sh"])
        }
        _ => LanguageProfile {
            image: base_image.to_string(),
            file_name: "main.txt",
            command: vec!["cat".to_string(), "/workspace/main.txt".to_string()],
            executes: false,
        },
    }
}

/// In-memory sandbox double for tests that run without a container engine.
///
/// Mirrors the runner contract: queued results are returned in order, an
/// optional artificial delay interacts with the request timeout to produce
/// the exit-124 sentinel, and cancellation interrupts the run.
#[derive(Default)]
pub struct MockSandbox {
    delay: Option<Duration>,
    queued: Mutex<Vec<SandboxResult>>,
    requests: Mutex<Vec<SandboxRequest>>,
}

impl MockSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_results(results: Vec<SandboxResult>) -> Self {
        Self {
            queued: Mutex::new(results),
            ..Default::default()
        }
    }

    /// Requests observed so far, in submission order.
    pub async fn recorded_requests(&self) -> Vec<SandboxRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl SandboxRunner for MockSandbox {
    async fn run(
        &self,
        request: SandboxRequest,
        cancel: CancellationToken,
    ) -> Result<SandboxResult> {
        self.requests.lock().await.push(request.clone());

        if let Some(delay) = self.delay {
            let sleep_for = delay.min(request.timeout);
            tokio::select! {
                _ = cancel.cancelled() => return Err(ForgeError::Canceled),
                _ = tokio::time::sleep(sleep_for) => {}
            }
            if delay >= request.timeout {
                return Ok(SandboxResult::timed_out(
                    String::new(),
                    request.timeout.as_millis() as u64,
                ));
            }
        }

        let mut queued = self.queued.lock().await;
        if queued.is_empty() {
            let language = request.language.as_deref().unwrap_or("generic");
            Ok(SandboxResult::new(
                0,
                format!("executed {language} program\n"),
                String::new(),
                self.delay.map(|d| d.as_millis() as u64).unwrap_or(5),
            ))
        } else {
            Ok(queued.remove(0))
        }
    }

    async fn cleanup(&self) {}
}
