use super::{Agent, AgentOutput};
use crate::{
    models::{AgentContext, Task, TaskType},
    Result,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// Produces a Terraform skeleton for the declared provider. Purely
/// template-driven; no oracle call is made.
pub struct InfraAgent;

fn provider_source(provider: &str) -> String {
    match provider {
        "azurerm" => "hashicorp/azurerm".to_string(),
        "aws" => "hashicorp/aws".to_string(),
        "google" | "gcp" => "hashicorp/google".to_string(),
        other => format!("hashicorp/{other}"),
    }
}

fn sanitize_name(raw: &str) -> String {
    let name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if name.is_empty() {
        "main".to_string()
    } else {
        name
    }
}

fn terraform_skeleton(provider: &str, name: &str, description: &str) -> String {
    let mut hcl = format!(
        r#"terraform {{
  required_version = ">= 1.5"

  required_providers {{
    {provider} = {{
      source  = "{source}"
      version = ">= 3.0"
    }}
  }}
}}

provider "{provider}" {{}}

variable "environment" {{
  type        = string
  description = "Deployment environment"
  default     = "dev"
}}

variable "location" {{
  type        = string
  description = "Primary deployment region"
  default     = "westeurope"
}}
"#,
        provider = provider,
        source = provider_source(provider),
    );

    if provider == "azurerm" {
        hcl.push_str(&format!(
            r#"
resource "azurerm_resource_group" "{name}" {{
  name     = "rg-{name}-${{var.environment}}"
  location = var.location

  tags = {{
    managed_by  = "forge-core"
    description = "{description}"
  }}
}}
"#
        ));
    }

    hcl.push_str(&format!(
        r#"
output "deployment_name" {{
  value = "{name}-${{var.environment}}"
}}
"#
    ));
    hcl
}

#[async_trait]
impl Agent for InfraAgent {
    fn task_type(&self) -> TaskType {
        TaskType::Infra
    }

    fn capabilities(&self) -> Vec<&'static str> {
        vec!["terraform-skeleton", "provider-templates"]
    }

    async fn produce(&self, task: &Task, _ctx: &AgentContext) -> Result<AgentOutput> {
        let provider = task
            .metadata
            .get("provider")
            .cloned()
            .unwrap_or_else(|| "azurerm".to_string());
        let name = sanitize_name(&task.id);
        let code = terraform_skeleton(&provider, &name, &task.description);

        let mut metadata = HashMap::new();
        metadata.insert("provider".to_string(), provider.clone());
        metadata.insert("format".to_string(), "hcl".to_string());

        Ok(AgentOutput {
            output: format!("Generated Terraform configuration for provider: {provider}"),
            code: Some(code),
            language: Some("hcl".to_string()),
            metadata,
            suggestions: vec![
                "Run terraform validate and plan before applying".to_string(),
            ],
        })
    }
}
