use agent_bridge::{create_router, AppState, Config};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "agent-bridge", about = "Meeting assistant bridge engine")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(short, long, default_value = "config/agent-bridge")]
    config: String,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let bind = args.bind.unwrap_or_else(|| cfg.service.http.bind.clone());
    let port = args.port.unwrap_or(cfg.service.http.port);

    info!("{} starting", cfg.service.name);
    info!("Agent display name: {}", cfg.mention.display_name);
    info!(
        "Behavior pattern: {} (captions: {:?}, chat: {:?})",
        cfg.behavior.pattern.name,
        cfg.behavior.pattern.caption_mention.behavior_mode,
        cfg.behavior.pattern.chat_mention.behavior_mode
    );

    let state = AppState::new(Arc::new(cfg));
    let router = create_router(state);

    let addr = format!("{}:{}", bind, port);
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, router)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
