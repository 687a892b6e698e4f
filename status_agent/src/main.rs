//! Entry point for status_agent. Loads configuration, binds, and serves until killed.

use status_agent::config::{Invocation, STATUS_PATH, USAGE};
use status_agent::{ws, AgentConfig, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match AgentConfig::load() {
        Ok(Invocation::Run(c)) => c,
        Ok(Invocation::Help) => {
            println!("{USAGE}");
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            return Err(e.into());
        }
    };

    let listener = ws::bind(&config).await?;
    info!(
        addr = %listener.local_addr()?,
        path = STATUS_PATH,
        interval_ms = config.status_interval.as_millis() as u64,
        "status agent listening"
    );
    ws::serve(listener, AppState::new(config)).await?;
    Ok(())
}
