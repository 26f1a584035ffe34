use anyhow::{Context, Result};
use tracing::info;

use crate::cache::spawn_maintenance;
use crate::cli::config::{load_config_from_path, Config};
use crate::cli::ServeArgs;
use crate::native::{build_router, AppState};

/// Resolve the effective config: explicit file or search path, then flag overrides.
pub fn resolve_config(args: &ServeArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => load_config_from_path(path)?,
        None => Config::load()?,
    };
    if let Some(url) = &args.url {
        config.connection.url = url.clone();
    }
    if let Some(listen) = &args.listen {
        config.server.listen = listen.clone();
    }
    Ok(config)
}

pub async fn execute_serve(args: ServeArgs) -> Result<()> {
    let config = resolve_config(&args)?;

    let state = AppState::from_config(config.connection.clone(), &config.cache);
    let maintenance = spawn_maintenance(
        state.dispatcher.cache().clone(),
        config.cache.cleanup_interval(),
        config.cache.optimize_interval(),
    );
    state.manager.start();

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen))?;
    info!(
        listen = %config.server.listen,
        url = %config.connection.url,
        "proxywatch listening"
    );

    let manager = state.manager.clone();
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    manager.disconnect().await;
    maintenance.stop().await;
    Ok(())
}
