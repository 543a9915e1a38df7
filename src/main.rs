use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;

use studiocrm::auth::service::ensure_admin_account;
use studiocrm::core::shared::utils::{create_pool, run_migrations};
use studiocrm::{run_server, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate()?;
    let addr = config.server.bind_address()?;
    info!(
        "Starting studiocrm {} ({})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );

    let pool = create_pool(&config.database)?;
    run_migrations(&pool)?;

    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("create-admin") {
        let (Some(username), Some(password)) = (args.get(2), args.get(3)) else {
            bail!("usage: studiocrm create-admin <username> <password>");
        };
        let id = ensure_admin_account(&pool, username, password).await?;
        info!("Administrator account {username} ready (employee {id})");
        return Ok(());
    }

    let state = Arc::new(AppState::new(pool, config));
    if let Err(e) = run_server(state, addr).await {
        error!("Server error: {e}");
        return Err(e.into());
    }
    Ok(())
}
