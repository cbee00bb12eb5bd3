use clap::Parser;
use log::{info, warn};
use server::game::GameState;
use server::network::{Server, ServerResult};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Roster broadcasts per second
    #[arg(short, long, default_value = "20")]
    tick_rate: u32,

    /// Maximum number of connected players, capped so the roster fits one datagram
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Text map to serve instead of the built-in arena ('#' marks a wall)
    #[arg(long)]
    map: Option<PathBuf>,
}

fn load_game_state(map: Option<&PathBuf>) -> ServerResult<GameState> {
    let Some(path) = map else {
        return Ok(GameState::reference()?);
    };

    let text = std::fs::read_to_string(path)?;
    let rows: Vec<String> = text
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .filter(|line| !line.is_empty())
        .collect();

    match GameState::with_map(rows) {
        Ok(state) => {
            info!("Loaded map from {}", path.display());
            Ok(state)
        }
        Err(e) => {
            warn!("Rejected map {}: {}", path.display(), e);
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> ServerResult<()> {
    env_logger::init();

    let args = Args::parse();

    let game_state = load_game_state(args.map.as_ref())?;
    let tick_rate = args.tick_rate.max(1);
    let address = format!("{}:{}", args.host, args.port);

    info!(
        "Starting server on {} ({}Hz, up to {} clients)",
        address, tick_rate, args.max_clients
    );

    let mut server = Server::new(
        &address,
        Duration::from_secs_f64(1.0 / tick_rate as f64),
        args.max_clients,
        game_state,
    )
    .await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
