use anyhow::Result;
use forge_core::{
    agents::AgentFactory,
    api::ApiServer,
    completion::HttpCompletionClient,
    config::Config,
    constants::SHUTDOWN_GRACE_SECS,
    executor::TaskExecutor,
    sandbox::{DockerSandbox, SandboxRunner},
    validator::HttpValidationClient,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("starting Forge Core task pipeline");

    let config = Config::load()?;

    let oracle = Arc::new(HttpCompletionClient::new(config.completion.clone())?);
    let validator = Arc::new(HttpValidationClient::new(config.validation.clone())?);
    let sandbox: Arc<dyn SandboxRunner> = Arc::new(DockerSandbox::new(config.sandbox.clone())?);
    let factory = Arc::new(AgentFactory::new(oracle));

    let executor = TaskExecutor::new(
        config.executor.clone(),
        factory,
        sandbox.clone(),
        validator,
    );
    let api_server = ApiServer::new(config.api.clone(), executor.clone());

    tokio::select! {
        result = api_server.run() => {
            if let Err(e) = result {
                error!("API server failed: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    executor
        .shutdown(Duration::from_secs(SHUTDOWN_GRACE_SECS))
        .await;
    sandbox.cleanup().await;
    info!("Forge Core stopped");

    Ok(())
}
