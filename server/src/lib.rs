//! # Arena Server Library
//!
//! The authoritative host for an arena match. It owns the map every client
//! plays on, assigns player ids, tracks positions and health, and decides
//! whether a reported hit lands.
//!
//! ## Responsibilities
//!
//! - **Handshake**: a `Connect` gets a player id, a collision-free spawn and
//!   the map. Repeating the handshake from the same address is harmless, so
//!   clients can retry over UDP until the map arrives.
//! - **Relay**: position reports are stored and forwarded to the other
//!   clients. Clients resolve their own movement against walls.
//! - **Hit authority**: hit reports are applied here and the resulting health
//!   is broadcast to everyone.
//! - **Liveness**: clients that stay silent for five seconds are dropped and
//!   the others are told they left.
//! - **Recovery**: the full roster is broadcast every tick so lost datagrams
//!   heal on their own.
//!
//! ## Module Organization
//!
//! - `client_manager`: address to id mapping, capacity and timeouts
//! - `game`: the match state and its rules
//! - `network`: the UDP socket, background tasks and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::GameState;
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:5661",
//!         Duration::from_millis(50), // 20Hz roster broadcast
//!         16,
//!         GameState::reference()?,
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
