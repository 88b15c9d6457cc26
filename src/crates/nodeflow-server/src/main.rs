//! nodeflow server binary
//!
//! One command: `nodeflow run <OPS_DIR>` builds the operation registry from
//! the given tree and serves the API. Process health is signaled only by
//! the listening socket.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use nodeflow_core::introspect::introspect;
use nodeflow_server::api::{create_router, AppState};

#[derive(Parser)]
#[command(name = "nodeflow", version, about = "Graph execution server for nodepack operations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server over an operations tree
    Run {
        /// Root directory scanned for nodepack manifests
        #[arg(default_value = "nodepacks")]
        ops_dir: PathBuf,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value_t = 8000)]
        port: u16,

        /// Re-scan the operations tree on every request
        #[arg(long)]
        reload: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            ops_dir,
            host,
            port,
            reload,
        } => run(ops_dir, host, port, reload).await,
    }
}

async fn run(ops_dir: PathBuf, host: String, port: u16, reload: bool) -> anyhow::Result<()> {
    let library = nodeflow_ops::builtin_library();
    let registry = introspect(&ops_dir, &library)?;
    info!(
        operations = registry.len(),
        root = %ops_dir.display(),
        "operation registry built"
    );
    if reload {
        info!("reload enabled: the operations tree is re-scanned per request");
    }

    let state = AppState::new(registry, library, ops_dir, reload);
    let router = create_router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}
