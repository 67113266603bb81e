//! EvoAgent bridge - serves the instruction optimizer to a caller process.
//!
//! The protocol owns stdout, so logs always go to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use evoagent_bridge::{Bridge, BridgeConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "evoagent-bridge")]
#[command(about = "Evolutionary agent-instruction optimizer over line-delimited JSON", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Seed used by requests that carry none
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve on stdin/stdout
    Stdio,

    /// Serve on a Unix socket
    Socket {
        /// Socket path
        path: std::path::PathBuf,
    },

    /// List available commands
    ListCommands,

    /// Print server info
    Info,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let bridge = Bridge::with_config(BridgeConfig {
        seed: cli.seed,
        ..Default::default()
    });

    match cli.command {
        Commands::Stdio => {
            bridge.start_with_stdio().await?;
        }

        Commands::Socket { path } => {
            bridge.start_with_socket(&path).await?;
        }

        Commands::ListCommands => {
            let names = bridge.registry().names();
            println!("Available commands ({}):", names.len());
            for name in names {
                println!("  - {}", name);
            }
        }

        Commands::Info => {
            let config = bridge.config();
            println!("{} bridge v{}", config.server_name, config.version);
            println!("Transport: stdio / Unix socket");
            println!("Commands: {}", bridge.registry().len());
            if let Some(seed) = config.seed {
                println!("Seed: {}", seed);
            }
        }
    }

    info!("Shutting down");
    Ok(())
}
