use clap::Parser;
use log::{error, info};
use server::level_store::{DEFAULT_LEVEL_DIRECTORIES, DEFAULT_LEVEL_FILE};
use server::network::{Server, ServerConfig};
use shared::TICK_RATE;
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "3000")]
    port: u16,
    /// Tick rate (updates per second)
    #[clap(short, long, default_value_t = TICK_RATE)]
    tick_rate: u32,
    /// Level directory, searched in the order given (repeatable)
    #[clap(short, long = "levels-dir")]
    levels_dir: Vec<PathBuf>,
    /// Level used when a room is created without one
    #[clap(short, long, default_value = DEFAULT_LEVEL_FILE)]
    default_level: String,
    /// Maximum number of concurrent connections
    #[clap(short, long, default_value = "256")]
    max_connections: usize,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        let level_directories = if args.levels_dir.is_empty() {
            DEFAULT_LEVEL_DIRECTORIES.iter().map(PathBuf::from).collect()
        } else {
            args.levels_dir
        };

        ServerConfig {
            bind_addr: format!("{}:{}", args.host, args.port),
            tick_rate: args.tick_rate,
            max_connections: args.max_connections,
            level_directories,
            default_level: args.default_level,
        }
    }
}

/// Parses command-line arguments, then runs the server until it stops or
/// Ctrl+C is pressed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from(Args::parse());
    info!(
        "Starting server on {} ({} Hz, levels from {:?})",
        config.bind_addr, config.tick_rate, config.level_directories
    );

    let mut server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with an error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
