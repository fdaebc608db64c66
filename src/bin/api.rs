use financial_agent_coordinator::{
    agent::FinancialAgent, api::start_server, config::CoordinatorConfig,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = CoordinatorConfig::from_env()?;

    if config.reasoning.api_key.is_empty() {
        warn!("GEMINI_API_KEY not set; routing will use keyword fallback and fusion will concatenate");
    }

    info!("Financial Agent Coordinator - API Server");
    info!(port = config.api_port, database = %config.database_url, "Configuration loaded");

    let agent = Arc::new(FinancialAgent::from_config(&config)?);

    info!(capabilities = ?agent.list_capabilities(), "Agent initialized");
    info!("Starting API server...");

    start_server(agent, config.api_port).await?;

    Ok(())
}
