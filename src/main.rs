// ABOUTME: Main entry point for the Discord webhook bridge
// ABOUTME: Initializes logging, config, caches, the session thread, the forwarder, and the HTTP server

use anyhow::{Context, Result};
use hookbridge::{
    bus::EventBus, config::Config, discord, forwarder::JoinForwarder, store::AppendLog, webhook,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Set up panic hook to log panics before they crash the process
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n╔══════════════════════════════════════════════════════════╗");
        eprintln!("║ PANIC! Bridge crashed with the following error:          ║");
        eprintln!("╚══════════════════════════════════════════════════════════╝\n");
        eprintln!("{}", panic_info);
        eprintln!("\nBacktrace:");
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Discord webhook bridge");

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Arc::new(Config::load()?);

    tracing::info!(
        guild_id = config.discord.guild_id,
        webhook_host = %config.webhook.host,
        webhook_port = config.webhook.port,
        join_forwarding = config.forwarder.join_url.is_some(),
        "Configuration loaded"
    );

    // In-memory caches: the session context writes, HTTP handlers read
    let invites: AppendLog<String> = AppendLog::new();
    let members = AppendLog::new();

    // Event bus: session runtime publishes, forwarder subscribes
    let bus = EventBus::new(256);

    // Forwarder must subscribe before the session can emit events
    let forwarder = JoinForwarder::new(members, config.forwarder.join_url.clone())
        .context("Failed to initialize join forwarder")?;
    forwarder.spawn(&bus);

    // Discord session on its own thread; the bridge is the only way in
    let bridge = discord::spawn_session(config.discord.clone(), bus)?;

    // Serve webhooks until the process exits
    webhook::start_webhook_server(config, bridge, invites).await?;

    Ok(())
}
