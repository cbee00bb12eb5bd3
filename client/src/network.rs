//! UDP transport on a background tokio runtime, and the frame loop that ties
//! input, simulation, networking and rendering together.

use crate::game::ClientGameState;
use crate::input::InputManager;
use crate::rendering::{RenderConfig, Renderer};
use log::{error, info, warn};
use macroquad::prelude::{get_frame_time, next_frame, screen_height, screen_width};
use shared::{
    Intent, Packet, Vector2, MAX_PACKET_SIZE, PROTOCOL_VERSION, WORLD_HEIGHT, WORLD_WIDTH,
};
use std::net::SocketAddr;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

pub type ClientResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// How often the keep-alive timer fires: a heartbeat once connected, a
/// handshake retry before that.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Where the handshake with the server stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// Sending `Connect` until the map arrives
    Connecting,
    Established,
    /// The server turned us away; stop retrying
    Rejected,
}

impl Handshake {
    pub fn observe(&mut self, packet: &Packet) {
        match packet {
            Packet::Map { .. } if *self == Handshake::Connecting => {
                *self = Handshake::Established;
            }
            Packet::Disconnected { .. } => *self = Handshake::Rejected,
            _ => {}
        }
    }

    /// The packet to send when the keep-alive timer fires
    pub fn keepalive_packet(&self) -> Option<Packet> {
        match self {
            Handshake::Connecting => Some(Packet::Connect {
                client_version: PROTOCOL_VERSION,
            }),
            Handshake::Established => Some(Packet::Heartbeat),
            Handshake::Rejected => None,
        }
    }
}

/// Handle the frame loop uses to talk to the network thread
pub struct Connection {
    outbound: mpsc::UnboundedSender<Packet>,
    inbound: mpsc::UnboundedReceiver<Packet>,
    thread: Option<JoinHandle<()>>,
}

impl Connection {
    /// Starts the network thread. The handshake begins immediately.
    pub fn spawn(server_addr: SocketAddr, fake_ping_ms: u64) -> ClientResult<Self> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let thread = std::thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to start network runtime: {}", e);
                        return;
                    }
                };

                let task = transport(server_addr, fake_ping_ms, outbound_rx, inbound_tx);
                if let Err(e) = runtime.block_on(task) {
                    error!("Network task failed: {}", e);
                }
            })?;

        Ok(Self {
            outbound: outbound_tx,
            inbound: inbound_rx,
            thread: Some(thread),
        })
    }

    pub fn send(&self, packet: Packet) {
        if self.outbound.send(packet).is_err() {
            warn!("Network thread has stopped; dropping packet");
        }
    }

    pub fn try_recv(&mut self) -> Option<Packet> {
        self.inbound.try_recv().ok()
    }

    /// Closes the outbound channel, which makes the network thread say
    /// goodbye to the server, then waits for it to finish.
    pub fn shutdown(mut self) {
        let thread = self.thread.take();
        drop(self);
        if let Some(thread) = thread {
            if thread.join().is_err() {
                error!("Network thread panicked");
            }
        }
    }
}

async fn send_packet(
    socket: &UdpSocket,
    server_addr: SocketAddr,
    packet: &Packet,
    fake_ping_ms: u64,
) -> ClientResult<()> {
    if fake_ping_ms > 0 {
        sleep(Duration::from_millis(fake_ping_ms / 2)).await;
    }

    let data = packet.encode()?;
    socket.send_to(&data, server_addr).await?;
    Ok(())
}

/// Runs until the frame loop drops its sender or stops listening.
async fn transport(
    server_addr: SocketAddr,
    fake_ping_ms: u64,
    mut outbound: mpsc::UnboundedReceiver<Packet>,
    inbound: mpsc::UnboundedSender<Packet>,
) -> ClientResult<()> {
    let bind_addr = if server_addr.is_ipv4() {
        "0.0.0.0:0"
    } else {
        "[::]:0"
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    info!("Connecting to {} from {}", server_addr, socket.local_addr()?);

    let mut handshake = Handshake::Connecting;
    let mut keepalive = interval(KEEPALIVE_INTERVAL);
    let mut buffer = [0u8; MAX_PACKET_SIZE];

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buffer) => {
                match result {
                    Ok((len, from)) => {
                        if from != server_addr {
                            warn!("Ignoring datagram from {}", from);
                            continue;
                        }

                        if fake_ping_ms > 0 {
                            sleep(Duration::from_millis(fake_ping_ms / 2)).await;
                        }

                        match Packet::decode(&buffer[..len]) {
                            Ok(packet) => {
                                handshake.observe(&packet);
                                if inbound.send(packet).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Failed to deserialize packet: {}", e),
                        }
                    }
                    Err(e) => error!("Error receiving packet: {}", e),
                }
            },

            packet = outbound.recv() => {
                match packet {
                    Some(packet) => {
                        if let Err(e) = send_packet(&socket, server_addr, &packet, fake_ping_ms).await {
                            error!("Error sending packet: {}", e);
                        }
                    }
                    None => {
                        if handshake == Handshake::Established {
                            send_packet(&socket, server_addr, &Packet::Disconnect, 0).await?;
                        }
                        break;
                    }
                }
            },

            _ = keepalive.tick() => {
                if let Some(packet) = handshake.keepalive_packet() {
                    if let Err(e) = send_packet(&socket, server_addr, &packet, fake_ping_ms).await {
                        error!("Error sending keep-alive: {}", e);
                    }
                }
            },
        }
    }

    info!("Network task stopped");
    Ok(())
}

/// Servers place players in a fixed-size world, so a networked window has to
/// match it tile for tile.
fn check_networked_viewport(width: usize, height: usize) -> ClientResult<()> {
    if width as f32 != WORLD_WIDTH || height as f32 != WORLD_HEIGHT {
        return Err(format!(
            "networked play needs a {}x{} window, got {}x{}",
            WORLD_WIDTH, WORLD_HEIGHT, width, height
        )
        .into());
    }
    Ok(())
}

/// The game client: owns the connection, the local world, input and the
/// renderer, and runs one frame at a time.
pub struct Client {
    connection: Option<Connection>,
    server_label: Option<String>,
    game_state: ClientGameState,
    input_manager: InputManager,
    renderer: Renderer,
    fake_ping_ms: u64,
}

impl Client {
    pub fn new(
        server_addr: &str,
        fake_ping_ms: u64,
        width: usize,
        height: usize,
        pointer_movement: bool,
    ) -> ClientResult<Self> {
        check_networked_viewport(width, height)?;
        let addr: SocketAddr = server_addr.parse()?;
        let connection = Connection::spawn(addr, fake_ping_ms)?;
        let viewport = Vector2::new(width as f32, height as f32);

        Ok(Client {
            connection: Some(connection),
            server_label: Some(addr.to_string()),
            game_state: ClientGameState::new(viewport, pointer_movement),
            input_manager: InputManager::new(),
            renderer: Renderer::new(width, height),
            fake_ping_ms,
        })
    }

    pub fn offline(width: usize, height: usize, pointer_movement: bool) -> Self {
        let viewport = Vector2::new(width as f32, height as f32);
        Client {
            connection: None,
            server_label: None,
            game_state: ClientGameState::offline(viewport, pointer_movement),
            input_manager: InputManager::new(),
            renderer: Renderer::new(width, height),
            fake_ping_ms: 0,
        }
    }

    fn drain_packets(&mut self) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        while let Some(packet) = connection.try_recv() {
            self.game_state.apply_packet(packet);
        }
    }

    fn send_intents(&self, intents: Vec<Intent>) {
        let Some(connection) = self.connection.as_ref() else {
            return;
        };
        for intent in intents {
            connection.send(intent.into_packet());
        }
    }

    pub async fn run(&mut self) -> ClientResult<()> {
        loop {
            let frame = self.input_manager.update();
            if frame.quit {
                break;
            }

            // Only offline maps follow the window; a server's map is fixed-size
            if self.connection.is_none() {
                self.game_state
                    .resize(Vector2::new(screen_width(), screen_height()));
            }
            self.drain_packets();

            let intents = self.game_state.tick(&frame, get_frame_time());
            self.send_intents(intents);

            let config = RenderConfig {
                server: self.server_label.clone(),
                fake_ping_ms: self.fake_ping_ms,
            };
            self.renderer.render(&self.game_state, &config);

            next_frame().await;
        }

        if let Some(connection) = self.connection.take() {
            connection.shutdown();
        }

        Ok(())
    }
}
