use crate::{
    constants::{
        DEFAULT_MAX_CONCURRENT, DEFAULT_SANDBOX_CPU_MILLIS, DEFAULT_SANDBOX_DISK_MB,
        DEFAULT_SANDBOX_MEMORY_MB, DEFAULT_TASK_TIMEOUT_SECS, MAX_TASK_TIMEOUT_SECS,
        ORACLE_REQUEST_TIMEOUT_SECS,
    },
    Result,
};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub executor: ExecutorConfig,
    pub sandbox: SandboxConfig,
    pub completion: CompletionConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub max_concurrent: usize,
    pub default_timeout_secs: u64,
    pub max_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Root under which each job gets its own workspace directory.
    pub workdir_root: PathBuf,
    /// Image used when the task language has no dedicated profile.
    pub base_image: String,
    pub default_memory_mb: i64,
    pub default_cpu_millis: i64,
    pub default_disk_mb: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    pub base_url: String,
    /// Absent key is tolerated: completion failures are non-fatal and agents
    /// fall back to templates.
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("loaded .env file from {:?}", path),
            Err(_) => tracing::debug!("no .env file found, using process environment"),
        }

        let allowed_origins = env_or("FORGE_ALLOWED_ORIGINS", "http://localhost:3000")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let api = ApiConfig {
            host: env_or("FORGE_API_HOST", "127.0.0.1"),
            port: env_parse("FORGE_API_PORT", 8081),
            allowed_origins,
        };

        let executor = ExecutorConfig {
            max_concurrent: env_parse("FORGE_MAX_CONCURRENT", DEFAULT_MAX_CONCURRENT),
            default_timeout_secs: env_parse(
                "FORGE_DEFAULT_TIMEOUT_SECS",
                DEFAULT_TASK_TIMEOUT_SECS,
            ),
            max_timeout_secs: env_parse("FORGE_MAX_TIMEOUT_SECS", MAX_TASK_TIMEOUT_SECS),
        };

        let sandbox = SandboxConfig {
            workdir_root: PathBuf::from(env_or(
                "FORGE_SANDBOX_ROOT",
                &env::temp_dir().join("forge-sandbox").to_string_lossy(),
            )),
            base_image: env_or("FORGE_SANDBOX_BASE_IMAGE", "alpine:latest"),
            default_memory_mb: env_parse("FORGE_SANDBOX_MEMORY_MB", DEFAULT_SANDBOX_MEMORY_MB),
            default_cpu_millis: env_parse("FORGE_SANDBOX_CPU_MILLIS", DEFAULT_SANDBOX_CPU_MILLIS),
            default_disk_mb: env_parse("FORGE_SANDBOX_DISK_MB", DEFAULT_SANDBOX_DISK_MB),
        };

        let completion = CompletionConfig {
            base_url: env_or("FORGE_COMPLETION_BASE_URL", "https://api.anthropic.com"),
            api_key: env::var("FORGE_COMPLETION_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: env_or("FORGE_COMPLETION_MODEL", "claude-3-5-sonnet-20241022"),
            max_tokens: env_parse("FORGE_COMPLETION_MAX_TOKENS", 4096),
            request_timeout_secs: env_parse(
                "FORGE_COMPLETION_TIMEOUT_SECS",
                ORACLE_REQUEST_TIMEOUT_SECS,
            ),
        };

        let validation = ValidationConfig {
            base_url: env_or("FORGE_VALIDATION_BASE_URL", "http://127.0.0.1:8082"),
            request_timeout_secs: env_parse("FORGE_VALIDATION_TIMEOUT_SECS", 10),
        };

        let config = Config {
            api,
            executor,
            sandbox,
            completion,
            validation,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.executor.max_concurrent == 0 {
            return Err(crate::ForgeError::Configuration(
                "FORGE_MAX_CONCURRENT must be at least 1".to_string(),
            ));
        }
        if self.executor.default_timeout_secs == 0 || self.executor.max_timeout_secs == 0 {
            return Err(crate::ForgeError::Configuration(
                "execution timeouts must be greater than zero".to_string(),
            ));
        }
        if self.executor.default_timeout_secs > self.executor.max_timeout_secs {
            return Err(crate::ForgeError::Configuration(format!(
                "FORGE_DEFAULT_TIMEOUT_SECS ({}) exceeds FORGE_MAX_TIMEOUT_SECS ({})",
                self.executor.default_timeout_secs, self.executor.max_timeout_secs
            )));
        }
        if self.sandbox.default_memory_mb <= 0 || self.sandbox.default_cpu_millis <= 0 {
            return Err(crate::ForgeError::Configuration(
                "sandbox memory and cpu defaults must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    /// In-process defaults used by tests; `load` is the production path.
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8081,
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
            executor: ExecutorConfig {
                max_concurrent: DEFAULT_MAX_CONCURRENT,
                default_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
                max_timeout_secs: MAX_TASK_TIMEOUT_SECS,
            },
            sandbox: SandboxConfig {
                workdir_root: env::temp_dir().join("forge-sandbox"),
                base_image: "alpine:latest".to_string(),
                default_memory_mb: DEFAULT_SANDBOX_MEMORY_MB,
                default_cpu_millis: DEFAULT_SANDBOX_CPU_MILLIS,
                default_disk_mb: DEFAULT_SANDBOX_DISK_MB,
            },
            completion: CompletionConfig {
                base_url: "https://api.anthropic.com".to_string(),
                api_key: None,
                model: "claude-3-5-sonnet-20241022".to_string(),
                max_tokens: 4096,
                request_timeout_secs: ORACLE_REQUEST_TIMEOUT_SECS,
            },
            validation: ValidationConfig {
                base_url: "http://127.0.0.1:8082".to_string(),
                request_timeout_secs: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests;
