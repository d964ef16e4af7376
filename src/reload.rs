//! Configuration reload on SIGHUP

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::{ServerConfig, SharedState, reload_config};

/// Re-read the configuration from the path used at startup and swap it in.
///
/// On error the active configuration is left untouched.
pub async fn reload_from_disk(state: &SharedState) -> Result<Arc<ServerConfig>> {
    let new_config = reload_config(&state.config_path).await?;

    let previous = state.config.current();
    if previous.log_file != new_config.log_file
        || previous.listen_address() != new_config.listen_address()
    {
        warn!("Log file and listen address only take effect after a restart");
    }

    state.config.replace(new_config);
    info!("config reloaded from {:?}", state.config_path);
    Ok(state.config.current())
}

/// Reload, logging a failure and keeping the previous configuration.
pub async fn handle_reload(state: &SharedState) {
    if let Err(e) = reload_from_disk(state).await {
        error!("Failed to reload config, keeping the previous one: {}", e);
    }
}

/// Start a task that reloads the configuration on every SIGHUP.
#[cfg(unix)]
pub fn spawn_reload_listener(state: SharedState) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP, reloading configuration");
            handle_reload(&state).await;
        }
    });
    Ok(())
}

#[cfg(not(unix))]
pub fn spawn_reload_listener(_state: SharedState) -> Result<()> {
    warn!("Configuration reload on SIGHUP is not supported on this platform");
    Ok(())
}
