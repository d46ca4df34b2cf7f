//! `parley` binary: runs the chat relay and token API until Ctrl-C.

use std::time::Duration;

use clap::Parser;
use parley::prelude::*;
use tracing_subscriber::EnvFilter;

/// Chat relay and session broker for web games.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
struct Cli {
    /// Address of the WebSocket chat listener.
    #[arg(long, env = "PARLEY_CHAT_ADDR", default_value = "0.0.0.0:8000")]
    chat_addr: String,

    /// Address of the HTTP token API.
    #[arg(long, env = "PARLEY_HTTP_ADDR", default_value = "0.0.0.0:8080")]
    http_addr: String,

    /// Chat messages retained for late joiners and lagging clients.
    #[arg(long, env = "PARLEY_LOG_CAPACITY", default_value_t = 20)]
    log_capacity: usize,

    /// Session lifetime in seconds, both at creation and after each patch.
    #[arg(long, env = "PARLEY_TOKEN_LIFETIME_SECS", default_value_t = 60)]
    token_lifetime_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), ParleyError> {
    let cli = Cli::parse();

    // RUST_LOG overrides the default level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let lifetime = Duration::from_secs(cli.token_lifetime_secs);
    let server = ParleyServer::builder()
        .chat_addr(&cli.chat_addr)
        .http_addr(&cli.http_addr)
        .chat_config(ChatConfig {
            log_capacity: cli.log_capacity,
            ..ChatConfig::default()
        })
        .session_config(SessionConfig {
            creation_lifetime: lifetime,
            patch_lifetime: lifetime,
            ..SessionConfig::default()
        })
        .build()
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
}
