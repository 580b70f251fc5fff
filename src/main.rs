use discourse_sso_plugin::{config::PluginConfig, observability, router::router, state::SsoState};
use std::{error::Error, process::ExitCode};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> ExitCode {
    observability::init();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "Config.toml".to_string());
    let config = PluginConfig::load(&config_path)?;
    tracing::info!(?config, "loaded {config_path}");
    tracing::info!(
        plugin = %config.plugin.key,
        authentication_method = ?config.plugin.authentication_method,
        "serving auth plugin {}",
        config.plugin.display_name()
    );

    let listen_addr = config.listen_addr.clone();
    let state = SsoState::from_config(config)?;

    let listener = TcpListener::bind(&listen_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
