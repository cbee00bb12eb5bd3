//! Core of the tile arena: the tile grid, occlusion and shadow geometry,
//! movement and projectile resolution, and the packets both peers exchange.
//!
//! Nothing in this crate performs I/O or logs; failures are reported through
//! return values and left to the server and client to surface.

use serde::{Deserialize, Serialize};

pub mod geometry;
pub mod grid;
pub mod motion;
pub mod shadow;
pub mod world;

pub use geometry::{Circle, Rect, Vector2};
pub use grid::{Cell, GridError, TileGrid, REFERENCE_MAP};
pub use motion::{Direction, HitAuthority, Intent, MotionResolver, MoveInput};
pub use shadow::{cast_shadow, cast_shadows, is_visible, OcclusionMask, ShadowPolygon};
pub use world::{Actor, Projectile, World};

pub const PLAYER_SPEED: f32 = 70.0;
pub const PLAYER_RADIUS: f32 = 10.0;
pub const HIT_RADIUS: f32 = 10.0;
pub const BULLET_SPEED: f32 = 500.0;
pub const HIT_DAMAGE: f32 = 0.1;
pub const HEALTH_RAMP_RATE: f32 = 0.2;
pub const SHADOW_OPACITY: f32 = 0.6;
pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 800.0;
pub const SPAWN_POINT: Vector2 = Vector2::new(400.0, 400.0);
pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_PORT: u16 = 5661;

/// Largest datagram either side expects to receive.
pub const MAX_PACKET_SIZE: usize = 2048;

/// Most players one server hosts. A roster of this many still fits in a
/// single datagram.
pub const MAX_PLAYERS: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Position {
        x: f32,
        y: f32,
        rotation: f32,
    },
    Hit {
        target_id: u32,
        strength: f32,
    },
    Heartbeat,
    Disconnect,

    Connected {
        client_id: u32,
    },
    Map {
        rows: Vec<String>,
    },
    Roster {
        players: Vec<ActorSnapshot>,
    },
    PlayerMoved {
        id: u32,
        x: f32,
        y: f32,
        rotation: f32,
    },
    Health {
        id: u32,
        health: f32,
    },
    PlayerLeft {
        id: u32,
    },
    Error {
        reason: String,
    },
    Disconnected {
        reason: String,
    },
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Whether the encoded packet fits the peer's receive buffer.
    pub fn fits_datagram(&self) -> bool {
        bincode::serialized_size(self).is_ok_and(|size| size <= MAX_PACKET_SIZE as u64)
    }
}

/// One player's state as carried in a roster broadcast.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ActorSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub health: f32,
}

impl ActorSnapshot {
    pub fn position(&self) -> Vector2 {
        Vector2::new(self.x, self.y)
    }
}
