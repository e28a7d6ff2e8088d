use anyhow::Context;
use clap::Parser;
use pathproxy::{server, Args, ProxyConfig, ProxyState};
use std::net::TcpListener;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pathproxy=info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let config = match ProxyConfig::resolve(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let addr = config.listen_addr();
    info!(
        listen = %addr,
        target = %config.target,
        allowed_path = config.allowed_path.as_deref().unwrap_or("<any>"),
        "proxy configured"
    );

    let listener = TcpListener::bind(addr).with_context(|| format!("failed to bind {}", addr))?;
    let state = Arc::new(ProxyState::from_config(&config));

    server::serve(listener, state, shutdown_signal()).await?;
    info!("proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
