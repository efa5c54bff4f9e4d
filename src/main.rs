use clap::Parser;
use tracing::{error, info};

use switchboard::{
    app,
    cli::{self, Cli, Commands},
    config::Config,
    AppState,
};

#[tokio::main]
async fn main() {
    // Default to INFO if RUST_LOG is not set
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Check if running as probe client
    if let Some(Commands::Probe { url, name, call }) = cli.command {
        if let Err(e) = cli::run_probe(url, name, call).await {
            error!("probe error: {e}");
            std::process::exit(1);
        }
        return;
    }

    // Otherwise, run as relay server
    let config = Config::from_env();
    info!("Starting switchboard signaling relay on port {}", config.port);
    info!(
        "Blob sink: {} ({:?})",
        config.blob_path, config.blob_mode
    );

    let state = AppState::new(&config);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    info!("Switchboard listening on {addr}");

    axum::serve(listener, app(state))
        .await
        .expect("Failed to start server");
}
