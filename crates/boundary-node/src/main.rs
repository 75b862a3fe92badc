use std::path::PathBuf;

use clap::Parser;

use boundary_node::{Node, NodeConfig};

#[derive(Parser)]
#[command(name = "boundary-node", about = "Boundary router between a radio segment and a stream backbone")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/boundary/config.toml")]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match NodeConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        boundary_node::logging::init_json(&config.logging.level);
    } else {
        boundary_node::logging::init(&config.logging.level);
    }

    let mut node = match Node::new(config) {
        Ok(node) => node,
        Err(e) => {
            tracing::error!("failed to create node: {e}");
            std::process::exit(1);
        }
    };
    let handle = node.shutdown_handle();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received SIGINT, shutting down");
        handle.shutdown();
    });

    if let Err(e) = node.start().await {
        tracing::error!("failed to start node: {e}");
        node.shutdown().await;
        std::process::exit(1);
    }

    node.run().await;
    node.shutdown().await;
}
