use clap::Parser;
use client::network::Client;
use log::{error, info};
use macroquad::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5661")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Window width (networked play needs the 800x800 world size)
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "800")]
    height: usize,

    /// Play alone against practice dummies, without a server
    #[arg(long)]
    offline: bool,

    /// Start with pointer-based movement (toggle in game with P)
    #[arg(long)]
    pointer_movement: bool,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Arena".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Controls: WASD to move, Shift to walk, mouse to aim and shoot");
    info!("Up/Down adjust your own health, P toggles pointer-based movement, Esc quits");

    let mut client = if args.offline {
        info!("Starting offline session");
        Client::offline(args.width, args.height, args.pointer_movement)
    } else {
        info!("Connecting to: {}", args.server);
        if args.fake_ping > 0 {
            info!("Simulating {}ms latency", args.fake_ping);
        }
        match Client::new(
            &args.server,
            args.fake_ping,
            args.width,
            args.height,
            args.pointer_movement,
        ) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to start client: {}", e);
                return;
            }
        }
    };

    if let Err(e) = client.run().await {
        error!("Client stopped with error: {}", e);
    }
}
