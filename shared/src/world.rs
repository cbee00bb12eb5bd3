//! The world aggregate: map, actors and in-flight projectiles.

use std::collections::HashMap;

use crate::geometry::Vector2;
use crate::grid::{GridError, TileGrid};
use crate::shadow::{is_visible, OcclusionMask};
use crate::ActorSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub id: u32,
    pub position: Vector2,
    pub rotation: f32,
    pub health: f32,
}

impl Actor {
    pub fn new(id: u32, position: Vector2) -> Self {
        Self {
            id,
            position,
            rotation: 0.0,
            health: 1.0,
        }
    }

    /// Applies damage; health never drops below zero.
    pub fn hit(&mut self, damage: f32) {
        self.health = (self.health - damage).max(0.0);
    }

    pub fn adjust_health(&mut self, delta: f32) {
        self.health = (self.health + delta).clamp(0.0, 1.0);
    }

    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            rotation: self.rotation,
            health: self.health,
        }
    }
}

impl From<ActorSnapshot> for Actor {
    fn from(snapshot: ActorSnapshot) -> Self {
        Self {
            id: snapshot.id,
            position: snapshot.position(),
            rotation: snapshot.rotation,
            health: snapshot.health,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub owner: u32,
    pub position: Vector2,
    pub velocity: Vector2,
}

impl Projectile {
    pub fn advance(&mut self, dt: f32) {
        self.position = self.position.add(&self.velocity.scale(dt));
    }
}

/// Everything a peer knows about the current match. Passed explicitly to the
/// motion and rendering code.
#[derive(Debug, Clone, Default)]
pub struct World {
    grid: Option<TileGrid>,
    actors: HashMap<u32, Actor>,
    pub projectiles: Vec<Projectile>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grid(grid: TileGrid) -> Self {
        Self {
            grid: Some(grid),
            ..Self::default()
        }
    }

    pub fn grid(&self) -> Option<&TileGrid> {
        self.grid.as_ref()
    }

    /// Replaces the map. A malformed map leaves the current one in place.
    pub fn load_map<S: AsRef<str>>(&mut self, rows: &[S], viewport: Vector2) -> Result<(), GridError> {
        let grid = TileGrid::from_rows(rows, viewport)?;
        self.grid = Some(grid);
        Ok(())
    }

    pub fn resize(&mut self, viewport: Vector2) {
        if let Some(grid) = self.grid.as_mut() {
            grid.resize(viewport);
        }
    }

    pub fn actor(&self, id: u32) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn actor_mut(&mut self, id: u32) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn insert_actor(&mut self, actor: Actor) {
        self.actors.insert(actor.id, actor);
    }

    pub fn upsert_actor(&mut self, snapshot: ActorSnapshot) {
        match self.actors.get_mut(&snapshot.id) {
            Some(actor) => {
                actor.position = snapshot.position();
                actor.rotation = snapshot.rotation;
                actor.health = snapshot.health;
            }
            None => {
                self.actors.insert(snapshot.id, Actor::from(snapshot));
            }
        }
    }

    pub fn remove_actor(&mut self, id: u32) -> Option<Actor> {
        self.actors.remove(&id)
    }

    /// Returns `false` when no actor has this id.
    pub fn set_position(&mut self, id: u32, position: Vector2, rotation: f32) -> bool {
        match self.actors.get_mut(&id) {
            Some(actor) => {
                actor.position = position;
                actor.rotation = rotation;
                true
            }
            None => false,
        }
    }

    /// Returns `false` when no actor has this id.
    pub fn set_health(&mut self, id: u32, health: f32) -> bool {
        match self.actors.get_mut(&id) {
            Some(actor) => {
                actor.health = health.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }

    /// Drops every actor whose id is not listed. Returns the removed ids.
    pub fn retain_actors(&mut self, ids: &[u32]) -> Vec<u32> {
        let gone: Vec<u32> = self
            .actors
            .keys()
            .filter(|id| !ids.contains(id))
            .copied()
            .collect();
        for id in &gone {
            self.actors.remove(id);
        }
        gone
    }

    /// Actors other than the viewer with an unobstructed line of sight from
    /// it. Without a map nothing blocks sight.
    pub fn visible_actors(&self, viewer_id: u32) -> Vec<&Actor> {
        let Some(viewer) = self.actors.get(&viewer_id) else {
            return Vec::new();
        };
        self.actors
            .values()
            .filter(|actor| actor.id != viewer_id)
            .filter(|actor| match &self.grid {
                Some(grid) => is_visible(grid, viewer.position, actor.position),
                None => true,
            })
            .collect()
    }

    pub fn occlusion_mask(&self, viewpoint: Vector2, cell_size: f32) -> Option<OcclusionMask> {
        self.grid
            .as_ref()
            .map(|grid| OcclusionMask::from_grid(grid, viewpoint, cell_size))
    }
}
