//! Authoritative match state: the map every client is sent, and the
//! positions and health of connected players.

use log::info;
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{
    Actor, ActorSnapshot, GridError, MotionResolver, Packet, TileGrid, Vector2, World,
    REFERENCE_MAP, SPAWN_POINT, WORLD_HEIGHT, WORLD_WIDTH,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GameError {
    #[error("unknown player id {0}")]
    UnknownActor(u32),
    #[error("player {0} sent a non-finite position")]
    InvalidPosition(u32),
}

/// Why a map cannot be served
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MapError {
    #[error(transparent)]
    Malformed(#[from] GridError),
    #[error("{width}x{height} map does not fit in one datagram")]
    TooLarge { width: usize, height: usize },
}

pub struct GameState {
    pub tick: u32,
    map_rows: Vec<String>,
    world: World,
    resolver: MotionResolver,
}

impl GameState {
    /// Builds the state around a text map. The map is sent to clients in a
    /// single `Map` packet, so maps too large for one datagram are rejected
    /// along with malformed ones.
    pub fn with_map(rows: Vec<String>) -> Result<Self, MapError> {
        let grid = TileGrid::from_rows(&rows, Vector2::new(WORLD_WIDTH, WORLD_HEIGHT))?;
        let packet = Packet::Map { rows: rows.clone() };
        if !packet.fits_datagram() {
            return Err(MapError::TooLarge {
                width: grid.width(),
                height: grid.height(),
            });
        }

        Ok(Self {
            tick: 0,
            map_rows: rows,
            world: World::with_grid(grid),
            resolver: MotionResolver::default(),
        })
    }

    /// State around the built-in arena.
    pub fn reference() -> Result<Self, MapError> {
        Self::with_map(REFERENCE_MAP.iter().map(|row| row.to_string()).collect())
    }

    pub fn map_rows(&self) -> &[String] {
        &self.map_rows
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn player_count(&self) -> usize {
        self.world.actor_count()
    }

    /// Picks a random open tile whose centre fits a player without touching
    /// a wall, falling back to the fixed spawn point.
    pub fn spawn_point<R: Rng>(&self, rng: &mut R) -> Vector2 {
        let Some(grid) = self.world.grid() else {
            return SPAWN_POINT;
        };

        let mut open = Vec::new();
        for ty in 0..grid.height() as i32 {
            for tx in 0..grid.width() as i32 {
                if grid.is_wall(tx, ty) {
                    continue;
                }
                let center = grid.tile_rect(tx, ty).center();
                if !self.resolver.collides(grid, center, center) {
                    open.push(center);
                }
            }
        }

        open.choose(rng).copied().unwrap_or(SPAWN_POINT)
    }

    pub fn add_player(&mut self, client_id: u32) -> ActorSnapshot {
        let position = self.spawn_point(&mut rand::thread_rng());
        let actor = Actor::new(client_id, position);
        let snapshot = actor.snapshot();

        info!(
            "Added player {} at ({:.1}, {:.1})",
            client_id, position.x, position.y
        );
        self.world.insert_actor(actor);
        snapshot
    }

    pub fn remove_player(&mut self, client_id: u32) -> bool {
        let removed = self.world.remove_actor(client_id).is_some();
        if removed {
            info!("Removed player {}", client_id);
        }
        removed
    }

    /// Stores a client-reported position. Clients resolve their own wall
    /// collisions, so the position is taken as-is.
    pub fn update_position(
        &mut self,
        client_id: u32,
        x: f32,
        y: f32,
        rotation: f32,
    ) -> Result<(), GameError> {
        if !(x.is_finite() && y.is_finite() && rotation.is_finite()) {
            return Err(GameError::InvalidPosition(client_id));
        }
        if self.world.set_position(client_id, Vector2::new(x, y), rotation) {
            Ok(())
        } else {
            Err(GameError::UnknownActor(client_id))
        }
    }

    /// Applies a reported hit and returns the target's new health.
    pub fn apply_hit(&mut self, target_id: u32, strength: f32) -> Result<f32, GameError> {
        let actor = self
            .world
            .actor_mut(target_id)
            .ok_or(GameError::UnknownActor(target_id))?;
        actor.hit(strength.max(0.0));
        Ok(actor.health)
    }

    /// Every player, ordered by id.
    pub fn roster(&self) -> Vec<ActorSnapshot> {
        let mut players: Vec<ActorSnapshot> = self.world.actors().map(Actor::snapshot).collect();
        players.sort_by_key(|p| p.id);
        players
    }
}
