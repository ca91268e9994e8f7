//! `wl-bridge` Server - Main Entry Point

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use wl_bridge::binding::{AccountLinker, BindingService};
use wl_bridge::bot::{self, Bot, CustomCommands, GroupNotifier};
use wl_bridge::config;
use wl_bridge::console::RconConsole;
use wl_bridge::db::Store;
use wl_bridge::permissions::PermissionService;
use wl_bridge::resolver::MojangResolver;
use wl_bridge::whitelist::ConsoleWhitelist;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wl_bridge=debug,tower_http=info".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Arc::new(config::Config::from_env()?);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting wl-bridge"
    );

    // Open the binding store
    let store = Store::open(&config.database_url).await?;
    info!(bindings = store.count_bindings().await?, "Binding store ready");

    // External collaborators
    let resolver = Arc::new(MojangResolver::new(
        &config.resolver_api_url,
        &config.resolver_user_agent,
        config.external_timeout,
    )?);

    let console = Arc::new(RconConsole::new(
        config.rcon_address.clone(),
        config.rcon_password.clone(),
        config.external_timeout,
    ));
    // The console reconnects on demand, so an unreachable server is not fatal here
    if let Err(e) = console.connect().await {
        warn!(error = %e, "Server console unavailable at startup");
    }

    let custom = match &config.custom_commands_file {
        Some(path) => CustomCommands::from_file(path)?,
        None => CustomCommands::default(),
    };
    info!(count = custom.len(), "Custom commands loaded");

    let notifier = match &config.onebot_api_url {
        Some(url) => Some(GroupNotifier::new(
            url,
            config.onebot_access_token.clone(),
            config.external_timeout,
        )?),
        None => None,
    };
    if !config.has_onebot_api() {
        info!("ONEBOT_API_URL not set, notices are only logged");
    }

    // Core services
    let bindings = Arc::new(BindingService::new(store.clone(), config.external_timeout));
    let linker = AccountLinker::new(
        bindings,
        resolver,
        Arc::new(ConsoleWhitelist::new(console.clone())),
    );
    let permissions = PermissionService::new(store.clone());

    let bot = Arc::new(Bot::new(
        config.clone(),
        linker,
        permissions,
        console,
        custom,
        notifier,
    ));
    let app = bot::router(bot);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Listening for chat events");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    store.close().await;
    info!("Server shutdown complete");

    Ok(())
}
