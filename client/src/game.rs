//! Client-side match state: applies server packets to the local world and
//! runs the per-frame tick for the local player.

use crate::input::FrameInput;
use log::{debug, info, warn};
use shared::{
    Actor, ActorSnapshot, HitAuthority, Intent, MotionResolver, MoveInput, Packet, Vector2, World,
    REFERENCE_MAP, SPAWN_POINT,
};

/// Practice targets placed on the map when playing offline.
const PRACTICE_DUMMIES: [ActorSnapshot; 2] = [
    ActorSnapshot {
        id: 2,
        x: 100.0,
        y: 150.0,
        rotation: -0.3,
        health: 0.75,
    },
    ActorSnapshot {
        id: 3,
        x: 675.0,
        y: 383.0,
        rotation: -0.8,
        health: 0.15,
    },
];

pub struct ClientGameState {
    pub world: World,
    pub client_id: Option<u32>,
    resolver: MotionResolver,
    viewport: Vector2,
    pointer_movement: bool,
    last_error: Option<String>,
    disconnect_reason: Option<String>,
}

impl ClientGameState {
    pub fn new(viewport: Vector2, pointer_movement: bool) -> Self {
        Self {
            world: World::new(),
            client_id: None,
            resolver: MotionResolver::new(HitAuthority::Server),
            viewport,
            pointer_movement,
            last_error: None,
            disconnect_reason: None,
        }
    }

    /// Single-player session on the built-in map with local hit authority.
    pub fn offline(viewport: Vector2, pointer_movement: bool) -> Self {
        let mut state = Self::new(viewport, pointer_movement);
        state.resolver = MotionResolver::new(HitAuthority::Local);

        if let Err(e) = state.world.load_map(&REFERENCE_MAP, viewport) {
            warn!("Built-in map rejected: {}", e);
        }

        let scale = Vector2::new(viewport.x / shared::WORLD_WIDTH, viewport.y / shared::WORLD_HEIGHT);
        let place = |point: Vector2| Vector2::new(point.x * scale.x, point.y * scale.y);

        state.client_id = Some(1);
        state.world.insert_actor(Actor::new(1, place(SPAWN_POINT)));
        for dummy in PRACTICE_DUMMIES {
            let position = place(dummy.position());
            state.world.upsert_actor(ActorSnapshot {
                x: position.x,
                y: position.y,
                ..dummy
            });
        }
        state
    }

    pub fn local_actor(&self) -> Option<&Actor> {
        self.client_id.and_then(|id| self.world.actor(id))
    }

    /// Ready to play once the map, the id and our own actor are all known.
    pub fn is_ready(&self) -> bool {
        self.world.grid().is_some() && self.local_actor().is_some()
    }

    pub fn has_map(&self) -> bool {
        self.world.grid().is_some()
    }

    pub fn pointer_movement(&self) -> bool {
        self.pointer_movement
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn disconnect_reason(&self) -> Option<&str> {
        self.disconnect_reason.as_deref()
    }

    pub fn resize(&mut self, viewport: Vector2) {
        if viewport != self.viewport {
            self.viewport = viewport;
            self.world.resize(viewport);
        }
    }

    pub fn apply_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { client_id } => {
                if self.client_id != Some(client_id) {
                    info!("Connected! Client ID: {}", client_id);
                }
                self.client_id = Some(client_id);
                self.disconnect_reason = None;
            }

            Packet::Map { rows } => {
                // Handshake retries repeat the same map
                if self.world.grid().is_some_and(|grid| grid.to_rows() == rows) {
                    return;
                }
                match self.world.load_map(&rows, self.viewport) {
                    Ok(()) => info!("Received {}-row map", rows.len()),
                    Err(e) => warn!("Rejected map from server: {}", e),
                }
            }

            Packet::Roster { players } => self.apply_roster(players),

            Packet::PlayerMoved { id, x, y, rotation } => {
                if Some(id) == self.client_id {
                    return;
                }
                if !self.world.set_position(id, Vector2::new(x, y), rotation) {
                    debug!("Position for unknown player {}", id);
                }
            }

            Packet::Health { id, health } => {
                if !self.world.set_health(id, health) {
                    debug!("Health for unknown player {}", id);
                }
            }

            Packet::PlayerLeft { id } => {
                if self.world.remove_actor(id).is_some() {
                    info!("Player {} left", id);
                }
            }

            Packet::Error { reason } => {
                warn!("Server error: {}", reason);
                self.last_error = Some(reason);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.client_id = None;
                self.disconnect_reason = Some(reason);
            }

            Packet::Connect { .. }
            | Packet::Position { .. }
            | Packet::Hit { .. }
            | Packet::Heartbeat
            | Packet::Disconnect => {
                warn!("Unexpected packet type from server");
            }
        }
    }

    /// Upserts every listed player and drops the ones no longer listed. Our
    /// own position is ours to decide, so only its health is taken.
    fn apply_roster(&mut self, players: Vec<ActorSnapshot>) {
        let ids: Vec<u32> = players.iter().map(|p| p.id).collect();

        for snapshot in players {
            let is_local = Some(snapshot.id) == self.client_id;
            if is_local && self.world.actor(snapshot.id).is_some() {
                self.world.set_health(snapshot.id, snapshot.health);
            } else {
                self.world.upsert_actor(snapshot);
            }
        }

        for id in self.world.retain_actors(&ids) {
            debug!("Player {} missing from roster", id);
        }
    }

    /// Advances the local simulation by one frame and returns what the
    /// server needs to hear about.
    pub fn tick(&mut self, input: &FrameInput, dt: f32) -> Vec<Intent> {
        let mut intents = Vec::new();

        if input.toggle_pointer_movement {
            self.pointer_movement = !self.pointer_movement;
            info!("Pointer-based movement: {}", self.pointer_movement);
        }

        let Some(id) = self.client_id else {
            return intents;
        };
        if !self.is_ready() {
            return intents;
        }

        let mut turned = false;
        if let (Some(pointer), Some(actor)) = (input.pointer, self.world.actor_mut(id)) {
            let rotation = (pointer.y - actor.position.y).atan2(pointer.x - actor.position.x);
            if rotation != actor.rotation {
                actor.rotation = rotation;
                turned = true;
            }
        }

        let move_input = MoveInput {
            held: input.held.clone(),
            slow: input.slow,
            pointer_based: self.pointer_movement,
        };
        match self.resolver.move_actor(&mut self.world, id, &move_input, dt) {
            Some(intent) => intents.push(intent),
            None if turned => {
                if let Some(actor) = self.world.actor(id) {
                    intents.push(Intent::PositionChanged {
                        x: actor.position.x,
                        y: actor.position.y,
                        rotation: actor.rotation,
                    });
                }
            }
            None => {}
        }

        if input.health_up {
            self.resolver.ramp_health(&mut self.world, id, 1.0, dt);
        }
        if input.health_down {
            self.resolver.ramp_health(&mut self.world, id, -1.0, dt);
        }

        if input.fire {
            if let Some(pointer) = input.pointer {
                self.resolver.fire(&mut self.world, id, pointer);
            }
        }

        intents.extend(self.resolver.step_projectiles(&mut self.world, dt));
        intents
    }
}
