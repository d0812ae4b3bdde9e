//! Role-specific producers and their factory.
//!
//! Each agent turns a task description into an artifact: source code, an
//! infrastructure definition, a document, or a report. Agents hold no
//! mutable state across calls; everything they need arrives with the task
//! and its [`AgentContext`].

pub mod codegen;
pub mod doc;
pub mod infra;
pub mod report;
pub mod templates;
pub mod test_gen;

pub use codegen::CodegenAgent;
pub use doc::DocAgent;
pub use infra::InfraAgent;
pub use report::ReportAgent;
pub use test_gen::TestGenAgent;

use crate::{
    completion::CompletionOracle,
    models::{AgentContext, Task, TaskType},
    ForgeError, Result,
};
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};

/// Artifact produced by an agent for one task.
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    /// Human-readable summary, copied into the execution record.
    pub output: String,
    /// Present when the artifact should be run (or dumped) in the sandbox.
    pub code: Option<String>,
    pub language: Option<String>,
    pub metadata: HashMap<String, String>,
    pub suggestions: Vec<String>,
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn task_type(&self) -> TaskType;
    fn capabilities(&self) -> Vec<&'static str>;
    async fn produce(&self, task: &Task, ctx: &AgentContext) -> Result<AgentOutput>;
}

/// Maps each task type to its producer.
///
/// Dispatch is an exhaustive match over the closed [`TaskType`] enum; an
/// unparseable wire type is a factory error that the executor records as a
/// terminal failure.
pub struct AgentFactory {
    codegen: CodegenAgent,
    infra: InfraAgent,
    doc: DocAgent,
    test: TestGenAgent,
    analyze: ReportAgent,
    validate: ReportAgent,
    package: ReportAgent,
}

impl AgentFactory {
    pub fn new(oracle: Arc<dyn CompletionOracle>) -> Self {
        Self {
            codegen: CodegenAgent::new(oracle),
            infra: InfraAgent,
            doc: DocAgent,
            test: TestGenAgent,
            analyze: ReportAgent::new(TaskType::Analyze),
            validate: ReportAgent::new(TaskType::Validate),
            package: ReportAgent::new(TaskType::Package),
        }
    }

    pub fn agent_for(&self, task_type: &str) -> Result<&dyn Agent> {
        let kind: TaskType = task_type
            .parse()
            .map_err(|message: String| ForgeError::Agent { message })?;
        Ok(match kind {
            TaskType::Codegen => &self.codegen,
            TaskType::Infra => &self.infra,
            TaskType::Doc => &self.doc,
            TaskType::Test => &self.test,
            TaskType::Analyze => &self.analyze,
            TaskType::Validate => &self.validate,
            TaskType::Package => &self.package,
        })
    }

    /// Identifier stamped onto executions, e.g. `codegen-agent`.
    pub fn agent_id(task_type: &str) -> String {
        format!("{}-agent", task_type.to_lowercase())
    }
}
