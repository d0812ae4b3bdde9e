use super::{Agent, AgentOutput};
use crate::{
    models::{AgentContext, Task, TaskType},
    Result,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Shared producer for the report-only task types: analyze, validate and
/// package. These emit a short structured report and never return code.
pub struct ReportAgent {
    kind: TaskType,
}

impl ReportAgent {
    pub fn new(kind: TaskType) -> Self {
        Self { kind }
    }

    fn findings(&self, task: &Task, ctx: &AgentContext) -> Vec<String> {
        let complexity = if task.description.len() > 200 {
            "high"
        } else if task.description.len() > 60 {
            "medium"
        } else {
            "low"
        };
        match self.kind {
            TaskType::Analyze => vec![
                format!("Estimated complexity: {complexity}"),
                format!("Project type: {}", ctx.project_type),
                format!("Architecture: {}", ctx.architecture),
                "Recommended approach: incremental delivery with tests".to_string(),
            ],
            TaskType::Validate => vec![
                "Checked: description completeness".to_string(),
                format!(
                    "Checked: language hint {}",
                    task.language.as_deref().unwrap_or("absent")
                ),
                format!("Checked: {} requirement(s) declared", ctx.requirements.len()),
            ],
            TaskType::Package => vec![
                format!("Artifact name: {}", task.id),
                "Target: OCI image with pinned base".to_string(),
                "Publish step: push to the tenant registry".to_string(),
            ],
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl Agent for ReportAgent {
    fn task_type(&self) -> TaskType {
        self.kind
    }

    fn capabilities(&self) -> Vec<&'static str> {
        match self.kind {
            TaskType::Analyze => vec!["complexity-report"],
            TaskType::Validate => vec!["input-checklist"],
            TaskType::Package => vec!["packaging-plan"],
            _ => vec!["report"],
        }
    }

    async fn produce(&self, task: &Task, ctx: &AgentContext) -> Result<AgentOutput> {
        let mut report = format!(
            "## {} report\n\nTask: {}\nDescription: {}\n\nFindings:\n",
            self.kind, task.id, task.description
        );
        let findings = self.findings(task, ctx);
        for finding in &findings {
            report.push_str(&format!("- {finding}\n"));
        }

        let mut metadata = HashMap::new();
        metadata.insert("report_type".to_string(), self.kind.to_string());
        metadata.insert("finding_count".to_string(), findings.len().to_string());

        Ok(AgentOutput {
            output: report,
            code: None,
            language: None,
            metadata,
            suggestions: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn report_agents_never_return_code() {
        let task = Task::new("t1", "analyze", "billing pipeline").with_tenant("acme");
        for kind in [TaskType::Analyze, TaskType::Validate, TaskType::Package] {
            let produced = ReportAgent::new(kind)
                .produce(&task, &AgentContext::from_task(&task))
                .await
                .unwrap();
            assert!(produced.code.is_none());
            assert!(produced.output.contains("Findings:"));
            assert_eq!(
                produced.metadata.get("report_type").unwrap(),
                kind.as_str()
            );
        }
    }

    #[tokio::test]
    async fn analyze_report_grades_complexity() {
        let short = Task::new("t1", "analyze", "tiny job").with_tenant("acme");
        let produced = ReportAgent::new(TaskType::Analyze)
            .produce(&short, &AgentContext::from_task(&short))
            .await
            .unwrap();
        assert!(produced.output.contains("Estimated complexity: low"));
    }
}
