//! Outbound boundary to the validation oracle.
//!
//! The adapter scores agent-produced artifacts. It is infallible from the
//! executor's point of view: when the oracle is unreachable or answers with
//! garbage, a low-confidence local fallback is returned instead so the
//! execution itself never fails on validation.

use crate::{config::ValidationConfig, models::ValidationResult, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[async_trait]
pub trait ValidationOracle: Send + Sync {
    async fn validate(&self, code: &str, language: &str, task_type: &str) -> ValidationResult;
}

/// HTTP adapter for the external validation microservice.
#[derive(Debug, Clone)]
pub struct HttpValidationClient {
    http: reqwest::Client,
    config: ValidationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest<'a> {
    code: &'a str,
    language: &'a str,
    task_type: &'a str,
}

impl HttpValidationClient {
    pub fn new(config: ValidationConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    async fn call_oracle(
        &self,
        code: &str,
        language: &str,
        task_type: &str,
    ) -> Result<ValidationResult> {
        let response = self
            .http
            .post(format!("{}/validate", self.config.base_url))
            .json(&ValidateRequest {
                code,
                language,
                task_type,
            })
            .send()
            .await?
            .error_for_status()?;

        let mut result: ValidationResult = response.json().await?;
        if result.confidence.is_empty() {
            result.confidence = "high".to_string();
        }
        Ok(result)
    }
}

/// Heuristic stand-in used when the oracle cannot be reached.
pub fn fallback_result(code: &str, elapsed: Duration) -> ValidationResult {
    let has_content = !code.trim().is_empty();
    let score = if has_content { 50.0 } else { 0.0 };
    ValidationResult {
        overall_score: score,
        security_score: score,
        quality_score: score,
        passed: has_content,
        confidence: "low".to_string(),
        issues: Vec::new(),
        warnings: vec![
            "validation oracle unreachable; heuristic fallback applied".to_string(),
        ],
        validation_time_ms: elapsed.as_millis() as u64,
    }
}

#[async_trait]
impl ValidationOracle for HttpValidationClient {
    async fn validate(&self, code: &str, language: &str, task_type: &str) -> ValidationResult {
        let started = Instant::now();
        match self.call_oracle(code, language, task_type).await {
            Ok(mut result) => {
                if result.validation_time_ms == 0 {
                    result.validation_time_ms = started.elapsed().as_millis() as u64;
                }
                debug!(
                    overall = result.overall_score,
                    passed = result.passed,
                    "validation oracle answered"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, "validation oracle call failed, using fallback");
                fallback_result(code, started.elapsed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_url: String) -> ValidationConfig {
        ValidationConfig {
            base_url,
            request_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn validate_returns_oracle_scores() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/validate")
            .with_status(200)
            .with_body(
                r#"{"overallScore":92.5,"securityScore":88.0,"qualityScore":95.0,
                    "passed":true,"issues":[],"warnings":[],"validationTimeMs":12}"#,
            )
            .create_async()
            .await;

        let client = HttpValidationClient::new(test_config(server.url())).unwrap();
        let result = client.validate("fn main() {}", "rust", "codegen").await;

        assert!(result.passed);
        assert_eq!(result.overall_score, 92.5);
        assert_eq!(result.confidence, "high");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_oracle_yields_low_confidence_fallback() {
        // Port 1 is never listening.
        let client =
            HttpValidationClient::new(test_config("http://127.0.0.1:1".to_string())).unwrap();
        let result = client.validate("print('hi')", "python", "codegen").await;

        assert_eq!(result.confidence, "low");
        assert!(result.passed);
        assert!(!result.warnings.is_empty());
    }

    #[tokio::test]
    async fn error_status_yields_fallback() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/validate")
            .with_status(500)
            .create_async()
            .await;

        let client = HttpValidationClient::new(test_config(server.url())).unwrap();
        let result = client.validate("code", "go", "codegen").await;

        assert_eq!(result.confidence, "low");
    }

    #[test]
    fn fallback_fails_empty_artifacts() {
        let result = fallback_result("   ", Duration::from_millis(3));
        assert!(!result.passed);
        assert_eq!(result.overall_score, 0.0);
    }
}
