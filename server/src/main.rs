use clap::Parser;
use log::{error, info};
use server::config::{parse_round_minutes, ServerConfig};
use server::network::run_server;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(default_value = "8080")]
    port: u16,

    /// File of pre-authored matrices, one per line; random matrices otherwise
    #[arg(long)]
    matrices: Option<PathBuf>,

    /// Round length in minutes
    #[arg(long, default_value = "3", value_parser = parse_round_minutes)]
    duration: Duration,

    /// Seed for random matrices; defaults to the current time
    #[arg(long)]
    seed: Option<u64>,

    /// Word list, one word per line
    #[arg(long, default_value = server::config::DEFAULT_DICTIONARY)]
    dictionary: PathBuf,

    /// Pause between rounds in seconds
    #[arg(long, default_value = "10")]
    pause: u64,

    /// Maximum number of simultaneous players
    #[arg(long, default_value = "32")]
    max_players: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    });

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        seed,
        round_duration: args.duration,
        pause_duration: Duration::from_secs(args.pause),
        matrix_file: args.matrices,
        dictionary_file: Some(args.dictionary),
        max_players: args.max_players,
    };

    info!(
        "Starting server on {} ({}s rounds, {}s pause)",
        config.bind_addr(),
        config.round_duration.as_secs(),
        config.pause_duration.as_secs()
    );

    tokio::select! {
        result = run_server(config) => {
            if let Err(e) = &result {
                error!("Server error: {}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
