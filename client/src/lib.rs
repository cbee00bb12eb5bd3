//! # Arena Client Library
//!
//! The player-facing side of the arena: a macroquad window that draws the
//! map from the local player's point of view, hides whatever walls block,
//! and lets the player move, turn and shoot.
//!
//! ## Frame Loop
//!
//! Every frame runs the same three steps in order:
//!
//! 1. Drain packets the network thread has received and apply them to the
//!    local world.
//! 2. Sample input and tick the simulation: movement against walls,
//!    projectile flight and hit detection.
//! 3. Render the occlusion mask, walls, visible players and projectiles.
//!
//! The world is only ever touched from this loop. Networking runs on its own
//! thread with a small tokio runtime and talks to the loop through unbounded
//! channels.
//!
//! ## Authority
//!
//! Each client moves its own player and reports the new position; the server
//! relays it. Hits are detected locally but only reported. The server applies
//! the damage and broadcasts the resulting health. In offline mode there is
//! no server, so damage is applied on the spot.
//!
//! ## Module Organization
//!
//! - `game`: the local world and how server packets change it
//! - `input`: keyboard and mouse sampling
//! - `network`: the UDP transport, handshake and the frame loop driver
//! - `rendering`: macroquad drawing

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
