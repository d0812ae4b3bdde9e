use super::{templates, Agent, AgentOutput};
use crate::{
    completion::CompletionOracle,
    constants::ORACLE_REQUEST_TIMEOUT_SECS,
    models::{AgentContext, Task, TaskType},
    Result,
};
use async_trait::async_trait;
use regex::Regex;
use std::{collections::HashMap, sync::Arc, sync::OnceLock, time::Duration};
use tracing::{debug, warn};

/// Produces source code from a task description.
///
/// Drafts through the completion oracle under a short deadline and falls
/// back to a language-specific template when the oracle fails, so code
/// generation itself never fails an execution.
pub struct CodegenAgent {
    oracle: Arc<dyn CompletionOracle>,
}

static FENCE_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// Strips a fenced code block from an oracle response, returning the whole
/// trimmed response when no fence is present.
fn extract_code(response: &str) -> String {
    let pattern = FENCE_PATTERN
        .get_or_init(|| Regex::new(r"(?s)```[a-zA-Z0-9_+\-]*\s*\n(.*?)```").ok());
    if let Some(re) = pattern {
        if let Some(captures) = re.captures(response) {
            if let Some(block) = captures.get(1) {
                return block.as_str().trim_end().to_string() + "\n";
            }
        }
    }
    response.trim().to_string()
}

fn display_language(language: &str) -> String {
    let mut chars = language.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

impl CodegenAgent {
    pub fn new(oracle: Arc<dyn CompletionOracle>) -> Self {
        Self { oracle }
    }

    fn build_prompt(task: &Task, ctx: &AgentContext, language: &str) -> String {
        let mut prompt = format!(
            "Write a complete, runnable {language} program for the following task.\n\
             Task: {}\nProject type: {}\nArchitecture: {}\n",
            task.description, ctx.project_type, ctx.architecture
        );
        if !ctx.tech_stack.is_empty() {
            prompt.push_str(&format!("Tech stack: {}\n", ctx.tech_stack.join(", ")));
        }
        if !ctx.requirements.is_empty() {
            prompt.push_str("Requirements:\n");
            for requirement in &ctx.requirements {
                prompt.push_str(&format!("- {requirement}\n"));
            }
        }
        if !ctx.constraints.is_empty() {
            prompt.push_str("Constraints:\n");
            for constraint in &ctx.constraints {
                prompt.push_str(&format!("- {constraint}\n"));
            }
        }
        prompt.push_str("Reply with a single fenced code block and nothing else.");
        prompt
    }
}

#[async_trait]
impl Agent for CodegenAgent {
    fn task_type(&self) -> TaskType {
        TaskType::Codegen
    }

    fn capabilities(&self) -> Vec<&'static str> {
        vec!["code-generation", "language-templates", "oracle-drafting"]
    }

    async fn produce(&self, task: &Task, ctx: &AgentContext) -> Result<AgentOutput> {
        let language = task
            .language
            .clone()
            .unwrap_or_else(|| "python".to_string());

        // Preexisting source on the task short-circuits drafting entirely.
        if let Some(provided) = task.code.as_ref().filter(|c| !c.trim().is_empty()) {
            let mut metadata = HashMap::new();
            metadata.insert("language".to_string(), language.clone());
            metadata.insert("source".to_string(), "provided".to_string());
            metadata.insert("code_length".to_string(), provided.len().to_string());
            return Ok(AgentOutput {
                output: format!(
                    "Generated {} code for: {}",
                    display_language(&language),
                    task.description
                ),
                code: Some(provided.clone()),
                language: Some(language),
                metadata,
                suggestions: Vec::new(),
            });
        }

        let prompt = Self::build_prompt(task, ctx, &language);

        let oracle_deadline = Duration::from_secs(ORACLE_REQUEST_TIMEOUT_SECS);
        let (code, source) =
            match tokio::time::timeout(oracle_deadline, self.oracle.complete(&prompt)).await {
                Ok(Ok(response)) => {
                    debug!(task_id = %task.id, "completion oracle drafted code");
                    (extract_code(&response), "oracle")
                }
                Ok(Err(e)) => {
                    warn!(task_id = %task.id, error = %e, "completion oracle failed, using template");
                    (
                        templates::fallback_source(&language, &task.description),
                        "template",
                    )
                }
                Err(_) => {
                    warn!(task_id = %task.id, "completion oracle deadline exceeded, using template");
                    (
                        templates::fallback_source(&language, &task.description),
                        "template",
                    )
                }
            };

        let mut metadata = HashMap::new();
        metadata.insert("language".to_string(), language.clone());
        metadata.insert("source".to_string(), source.to_string());
        metadata.insert("code_length".to_string(), code.len().to_string());

        Ok(AgentOutput {
            output: format!(
                "Generated {} code for: {}",
                display_language(&language),
                task.description
            ),
            code: Some(code),
            language: Some(language),
            metadata,
            suggestions: vec![
                "Review the generated code before promoting it to production".to_string(),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ForgeError;

    struct StaticOracle(&'static str);

    #[async_trait]
    impl CompletionOracle for StaticOracle {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingOracle;

    #[async_trait]
    impl CompletionOracle for FailingOracle {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(ForgeError::Completion("oracle offline".to_string()))
        }
    }

    fn task() -> Task {
        Task::new("t1", "codegen", "hello service")
            .with_tenant("acme")
            .with_language("go")
    }

    #[tokio::test]
    async fn oracle_response_is_fence_stripped() {
        let agent = CodegenAgent::new(Arc::new(StaticOracle(
            "Here you go:\n```go\npackage main\n\nfunc main() {}\n```\nEnjoy!",
        )));
        let produced = agent
            .produce(&task(), &AgentContext::from_task(&task()))
            .await
            .unwrap();

        let code = produced.code.unwrap();
        assert!(code.starts_with("package main"));
        assert!(!code.contains("```"));
        assert_eq!(produced.metadata.get("source").unwrap(), "oracle");
    }

    #[tokio::test]
    async fn oracle_failure_falls_back_to_template() {
        let agent = CodegenAgent::new(Arc::new(FailingOracle));
        let produced = agent
            .produce(&task(), &AgentContext::from_task(&task()))
            .await
            .unwrap();

        assert_eq!(produced.metadata.get("source").unwrap(), "template");
        assert!(produced.code.unwrap().starts_with("package main"));
        assert_eq!(produced.output, "Generated Go code for: hello service");
    }

    #[tokio::test]
    async fn summary_names_the_language() {
        let agent = CodegenAgent::new(Arc::new(FailingOracle));
        let mut python_task = task();
        python_task.language = Some("python".to_string());

        let produced = agent
            .produce(&python_task, &AgentContext::from_task(&python_task))
            .await
            .unwrap();
        assert!(produced.output.starts_with("Generated Python code for:"));
    }

    #[tokio::test]
    async fn provided_code_bypasses_the_oracle() {
        struct PanicOracle;

        #[async_trait]
        impl CompletionOracle for PanicOracle {
            async fn complete(&self, _prompt: &str) -> Result<String> {
                panic!("oracle must not be called for provided code");
            }
        }

        let agent = CodegenAgent::new(Arc::new(PanicOracle));
        let mut bash_task = Task::new("t3", "codegen", "sleep job")
            .with_tenant("acme")
            .with_language("bash");
        bash_task.code = Some("sleep 10".to_string());

        let produced = agent
            .produce(&bash_task, &AgentContext::from_task(&bash_task))
            .await
            .unwrap();
        assert_eq!(produced.code.as_deref(), Some("sleep 10"));
        assert_eq!(produced.metadata.get("source").unwrap(), "provided");
    }

    #[test]
    fn unfenced_response_passes_through_trimmed() {
        assert_eq!(extract_code("  plain text  "), "plain text");
    }

    #[test]
    fn fence_without_language_tag_is_stripped() {
        let code = extract_code("```\nline one\nline two\n```");
        assert_eq!(code, "line one\nline two\n");
    }
}
