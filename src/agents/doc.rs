use super::{Agent, AgentOutput};
use crate::{
    models::{AgentContext, Task, TaskType},
    Result,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Emits a Markdown documentation skeleton; no oracle call is made.
pub struct DocAgent;

fn markdown_skeleton(task: &Task, ctx: &AgentContext) -> String {
    let mut doc = format!(
        "# {}\n\n## Overview\n\n{}\n\n## Architecture\n\n{}\n",
        task.description, task.description, ctx.architecture
    );
    if !ctx.tech_stack.is_empty() {
        doc.push_str("\n## Technology\n\n");
        for item in &ctx.tech_stack {
            doc.push_str(&format!("- {item}\n"));
        }
    }
    doc.push_str("\n## Requirements\n\n");
    if ctx.requirements.is_empty() {
        doc.push_str("- To be refined with stakeholders\n");
    } else {
        for requirement in &ctx.requirements {
            doc.push_str(&format!("- {requirement}\n"));
        }
    }
    doc.push_str("\n## Usage\n\nDescribe installation and invocation here.\n");
    doc
}

#[async_trait]
impl Agent for DocAgent {
    fn task_type(&self) -> TaskType {
        TaskType::Doc
    }

    fn capabilities(&self) -> Vec<&'static str> {
        vec!["markdown-skeleton"]
    }

    async fn produce(&self, task: &Task, ctx: &AgentContext) -> Result<AgentOutput> {
        let code = markdown_skeleton(task, ctx);

        let mut metadata = HashMap::new();
        metadata.insert("format".to_string(), "markdown".to_string());
        metadata.insert("section_count".to_string(), "4".to_string());

        Ok(AgentOutput {
            output: format!("Generated documentation skeleton for: {}", task.description),
            code: Some(code),
            language: Some("markdown".to_string()),
            metadata,
            suggestions: vec!["Fill in the usage section with concrete commands".to_string()],
        })
    }
}
