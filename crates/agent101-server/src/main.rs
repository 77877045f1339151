mod configuration;
mod error;
mod protocol;
mod routes;
mod state;

use agent101::controller::TurnController;
use agent101::providers::factory;
use agent101::runner::Runner;
use agent101::tools::travel::travel_tools;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load a local .env before reading any settings
    dotenv::dotenv().ok();

    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = configuration::Settings::new().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        e
    })?;

    let provider = factory::get_provider(settings.provider.into_config())?;
    let controller = Arc::new(TurnController::new(
        provider,
        settings.agent.controller_config(),
    ));

    let runner = if settings.agent.execute_tools {
        Runner::react(controller, Arc::new(travel_tools()))
    } else {
        Runner::single_turn(controller)
    };
    info!(
        agent = %settings.agent.name,
        execute_tools = settings.agent.execute_tools,
        persist_execution_state = settings.agent.persist_execution_state,
        "agent ready"
    );

    let app = routes::configure(state::AppState::new(runner, settings.agent.name.clone()));

    let listener = tokio::net::TcpListener::bind(settings.server.socket_addr()?).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
