//! Chatrelay HTTP server
//!
//! Starts an Axum web server that relays webhook messages to a hosted
//! chat-completion endpoint through the failover router.

use chatrelay::{
    cli::{Cli, Command},
    config::Config,
    handlers::{self, AppState},
    telemetry,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Handle subcommands before touching the config file
    if let Some(Command::Config { output }) = cli.command {
        let template = chatrelay::cli::generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                println!("Wrote configuration template to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    // Load configuration
    let config = Config::from_file(&cli.config)?;

    // Initialize telemetry
    telemetry::init(&config.observability.log_level);

    tracing::info!(
        "Starting Chatrelay server on {}:{}",
        config.server.host,
        config.server.port
    );

    // Build application state; this is where an empty credential pool
    // aborts startup
    let state = AppState::new(Arc::new(config.clone()))?;

    tracing::info!(
        pool_size = state.router().stats().await.pool_size,
        model_count = config.upstream.models().len(),
        "Failover router initialized"
    );

    let app = handlers::app(state);

    // Create socket address
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));

    tracing::info!("Listening on {}", addr);
    tracing::info!("Webhook URL: http://{}/webhook", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
