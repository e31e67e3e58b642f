use dotenvy::dotenv;
use log::info;
use std::sync::Arc;

use cally::core::config::AppConfig;
use cally::core::shared::state::AppState;
use cally::main_module::run_axum_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let config = AppConfig::from_env();
    info!(
        "Starting cally {} on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.server.host,
        config.server.port
    );

    let state = Arc::new(AppState::from_config(config).await);
    run_axum_server(state).await?;

    info!("Server stopped");
    Ok(())
}
