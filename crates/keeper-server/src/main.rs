mod config;
mod error;
mod handlers;
mod state;
mod stats;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use keeper_core::backend::{Backend, FileBackend};
use keeper_core::ingest;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "keeper-server", version, about = "stateless content-addressed backup server")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, value_name = "PATH")]
    configuration: Option<PathBuf>,

    /// Port to listen on (overrides the configuration file)
    #[arg(short, long, value_name = "N")]
    port: Option<u16>,

    /// Debug logging: 0 or 1
    #[arg(long, default_value_t = 0, value_parser = parse_debug)]
    debug: u8,
}

fn parse_debug(s: &str) -> Result<u8, String> {
    match s {
        "0" => Ok(0),
        "1" => Ok(1),
        _ => Err("value must be 0 or 1".into()),
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug == 1 {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to build tokio runtime: {e}");
            std::process::exit(1);
        });

    runtime.block_on(async_main(cli));
}

async fn async_main(cli: Cli) {
    let config = match &cli.configuration {
        Some(path) => ServerConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }),
        None => ServerConfig::default(),
    };
    let port = cli.port.unwrap_or(config.server.port);

    let prefix = PathBuf::from(&config.file_backend.file_directory);
    let backend = FileBackend::open(&prefix, config.file_backend.dir_level).unwrap_or_else(|e| {
        eprintln!(
            "Error: cannot initialise storage under '{}': {e}",
            prefix.display()
        );
        std::process::exit(1);
    });
    let backend: Arc<dyn Backend> = Arc::new(backend);

    let (writers, dispatcher) = ingest::start(Arc::clone(&backend)).unwrap_or_else(|e| {
        eprintln!("Error: cannot start writer threads: {e}");
        std::process::exit(1);
    });

    let state = AppState::new(backend, dispatcher);
    let app = handlers::router(state);

    let listen_addr = format!("{}:{}", config.server.ip, port);
    let listener = TcpListener::bind(&listen_addr).await.unwrap_or_else(|e| {
        eprintln!("Error: cannot bind to {listen_addr}: {e}");
        std::process::exit(1);
    });
    info!("keeper-server listening on {listen_addr}");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        eprintln!("Error: server failed: {e}");
        std::process::exit(1);
    }

    // The router (and with it every dispatcher clone) is gone; joining lets
    // the writers drain what was already acknowledged before we exit.
    writers.join();
    info!("write queues drained, exiting");
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested, draining write queues"),
        Err(e) => {
            tracing::error!("failed to install signal handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}
