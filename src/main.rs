use gitlab_webhook::error::Result;
use gitlab_webhook::logging::{FileLogger, setup_logging};
use gitlab_webhook::reload::spawn_reload_listener;
use gitlab_webhook::{AppState, api, load_config};
use std::sync::Arc;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "config.json";

async fn run(config_path: String) -> Result<()> {
    let config = load_config(&config_path)?;

    // Flushes the log file when `run` returns.
    let _log_guard = setup_logging(&FileLogger::new(&config.log_file))?;

    let bind_address = config.listen_address();
    let state = Arc::new(AppState::new(config, &config_path));
    spawn_reload_listener(Arc::clone(&state))?;

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on {}", bind_address);
    info!("Using config at {:?}", config_path);
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    if let Err(e) = run(config_path).await {
        eprintln!("Fatal: {}", e);
        std::process::exit(1);
    }
}
