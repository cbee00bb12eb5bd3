//! Movement against walls, projectile flight and hit detection.

use std::collections::HashSet;
use std::f32::consts::FRAC_PI_2;

use crate::geometry::{circle_intersects_rect, Circle, Rect, Vector2};
use crate::grid::TileGrid;
use crate::world::{Projectile, World};
use crate::{
    Packet, BULLET_SPEED, HEALTH_RAMP_RATE, HIT_DAMAGE, HIT_RADIUS, PLAYER_RADIUS, PLAYER_SPEED,
    WORLD_HEIGHT, WORLD_WIDTH,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn unit(self) -> Vector2 {
        match self {
            Direction::Up => Vector2::new(0.0, -1.0),
            Direction::Down => Vector2::new(0.0, 1.0),
            Direction::Left => Vector2::new(-1.0, 0.0),
            Direction::Right => Vector2::new(1.0, 0.0),
        }
    }
}

/// Movement keys held during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveInput {
    pub held: HashSet<Direction>,
    pub slow: bool,
    pub pointer_based: bool,
}

impl MoveInput {
    /// Signed sum of the held directions. Opposite keys cancel out.
    pub fn axis(&self) -> Vector2 {
        self.held
            .iter()
            .fold(Vector2::ZERO, |acc, direction| acc.add(&direction.unit()))
    }
}

/// Something the local tick produced that the other peers must hear about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    PositionChanged { x: f32, y: f32, rotation: f32 },
    HitScored { target_id: u32, strength: f32 },
}

impl Intent {
    pub fn into_packet(self) -> Packet {
        match self {
            Intent::PositionChanged { x, y, rotation } => Packet::Position { x, y, rotation },
            Intent::HitScored {
                target_id,
                strength,
            } => Packet::Hit {
                target_id,
                strength,
            },
        }
    }
}

/// Who decides that a hit lands and applies the damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HitAuthority {
    /// The client only reports hits; health comes back from the server.
    #[default]
    Server,
    /// Damage is applied on the spot. Used when playing offline.
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionResolver {
    pub speed: f32,
    pub radius: f32,
    pub hit_radius: f32,
    pub damage: f32,
    pub health_ramp: f32,
    pub authority: HitAuthority,
}

impl Default for MotionResolver {
    fn default() -> Self {
        Self {
            speed: PLAYER_SPEED,
            radius: PLAYER_RADIUS,
            hit_radius: HIT_RADIUS,
            damage: HIT_DAMAGE,
            health_ramp: HEALTH_RAMP_RATE,
            authority: HitAuthority::Server,
        }
    }
}

impl MotionResolver {
    pub fn new(authority: HitAuthority) -> Self {
        Self {
            authority,
            ..Self::default()
        }
    }

    /// Unit direction of travel for `input`, or zero when nothing is held.
    /// Pointer-based movement turns "up" toward the facing direction.
    pub fn direction(&self, input: &MoveInput, rotation: f32) -> Vector2 {
        let mut axis = input.axis();
        if input.pointer_based {
            axis = axis.rotated(rotation + FRAC_PI_2);
        }
        axis.normalize()
    }

    /// True when a collision circle at `candidate` overlaps any wall tile
    /// around `anchor`'s tile.
    pub fn collides(&self, grid: &TileGrid, anchor: Vector2, candidate: Vector2) -> bool {
        let (tx, ty) = grid.world_to_tile(anchor);
        let circle = Circle::new(candidate, self.radius);
        grid.neighborhood(tx, ty, 1)
            .any(|(x, y)| circle_intersects_rect(&grid.tile_rect(x, y), &circle))
    }

    /// Moves an actor for one tick. A move that would touch a wall is
    /// dropped entirely, leaving the actor where it was.
    pub fn move_actor(&self, world: &mut World, id: u32, input: &MoveInput, dt: f32) -> Option<Intent> {
        let actor = world.actor(id)?;
        let direction = self.direction(input, actor.rotation);
        if direction == Vector2::ZERO {
            return None;
        }

        let speed = if input.slow { self.speed / 2.0 } else { self.speed };
        let candidate = actor.position.add(&direction.scale(speed * dt));

        if let Some(grid) = world.grid() {
            if self.collides(grid, actor.position, candidate) {
                return None;
            }
        }

        let actor = world.actor_mut(id)?;
        actor.position = candidate;
        Some(Intent::PositionChanged {
            x: candidate.x,
            y: candidate.y,
            rotation: actor.rotation,
        })
    }

    /// Launches a projectile from the owner toward `target`. Returns `false`
    /// for an unknown owner or when the target is the owner's own position.
    pub fn fire(&self, world: &mut World, owner: u32, target: Vector2) -> bool {
        let Some(actor) = world.actor(owner) else {
            return false;
        };
        let aim = target.sub(&actor.position);
        if aim.magnitude_squared() == 0.0 {
            return false;
        }
        let projectile = Projectile {
            owner,
            position: actor.position,
            velocity: aim.normalize().scale(BULLET_SPEED),
        };
        world.projectiles.push(projectile);
        true
    }

    /// Advances every projectile and resolves hits. A projectile strikes at
    /// most one actor, the nearest one strictly within the hit radius.
    pub fn step_projectiles(&self, world: &mut World, dt: f32) -> Vec<Intent> {
        let bounds = world
            .grid()
            .map(|grid| grid.world_bounds())
            .unwrap_or_else(|| Rect::new(0.0, WORLD_WIDTH, 0.0, WORLD_HEIGHT));
        let hit_radius_sq = self.hit_radius * self.hit_radius;

        let mut intents = Vec::new();
        let mut projectiles = std::mem::take(&mut world.projectiles);

        projectiles.retain_mut(|projectile| {
            projectile.advance(dt);

            let target = world
                .actors()
                .filter(|actor| actor.id != projectile.owner)
                .map(|actor| (actor.id, actor.position.distance_squared(&projectile.position)))
                .filter(|&(_, dist_sq)| dist_sq < hit_radius_sq)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(id, _)| id);

            if let Some(target_id) = target {
                if self.authority == HitAuthority::Local {
                    if let Some(actor) = world.actor_mut(target_id) {
                        actor.hit(self.damage);
                    }
                }
                intents.push(Intent::HitScored {
                    target_id,
                    strength: self.damage,
                });
                return false;
            }

            if !bounds.contains(projectile.position) {
                return false;
            }

            match world.grid() {
                Some(grid) => {
                    let (tx, ty) = grid.world_to_tile(projectile.position);
                    !grid.is_wall(tx, ty)
                }
                None => true,
            }
        });

        world.projectiles = projectiles;
        intents
    }

    /// Debug control: moves health by the ramp rate in the direction of `sign`.
    pub fn ramp_health(&self, world: &mut World, id: u32, sign: f32, dt: f32) -> bool {
        match world.actor_mut(id) {
            Some(actor) => {
                actor.adjust_health(sign.signum() * self.health_ramp * dt);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::REFERENCE_MAP;
    use crate::world::Actor;
    use assert_approx_eq::assert_approx_eq;

    fn reference_world() -> World {
        World::with_grid(TileGrid::from_rows(&REFERENCE_MAP, Vector2::new(800.0, 800.0)).unwrap())
    }

    fn open_world() -> World {
        let rows = vec![" ".repeat(16); 16];
        World::with_grid(TileGrid::from_rows(&rows, Vector2::new(800.0, 800.0)).unwrap())
    }

    fn holding(directions: &[Direction]) -> MoveInput {
        MoveInput {
            held: directions.iter().copied().collect(),
            ..MoveInput::default()
        }
    }

    #[test]
    fn test_opposite_directions_cancel() {
        let input = holding(&[Direction::Up, Direction::Down, Direction::Left]);
        assert_eq!(input.axis(), Vector2::new(-1.0, 0.0));
        assert_eq!(
            holding(&[Direction::Left, Direction::Right]).axis(),
            Vector2::ZERO
        );
    }

    #[test]
    fn test_diagonal_is_normalized() {
        let resolver = MotionResolver::default();
        let direction = resolver.direction(&holding(&[Direction::Up, Direction::Right]), 0.0);
        assert_approx_eq!(direction.magnitude(), 1.0, 1e-6);
        assert_approx_eq!(direction.x, std::f32::consts::FRAC_1_SQRT_2, 1e-6);
        assert_approx_eq!(direction.y, -std::f32::consts::FRAC_1_SQRT_2, 1e-6);
    }

    #[test]
    fn test_pointer_based_up_follows_rotation() {
        let resolver = MotionResolver::default();
        let mut input = holding(&[Direction::Up]);
        input.pointer_based = true;

        let facing_right = resolver.direction(&input, 0.0);
        assert_approx_eq!(facing_right.x, 1.0, 1e-6);
        assert_approx_eq!(facing_right.y, 0.0, 1e-6);

        let facing_down = resolver.direction(&input, FRAC_PI_2);
        assert_approx_eq!(facing_down.x, 0.0, 1e-6);
        assert_approx_eq!(facing_down.y, 1.0, 1e-6);
    }

    #[test]
    fn test_move_in_open_space() {
        let mut world = reference_world();
        world.insert_actor(Actor::new(1, Vector2::new(400.0, 400.0)));
        let resolver = MotionResolver::default();

        let intent = resolver.move_actor(&mut world, 1, &holding(&[Direction::Right]), 0.1);
        match intent {
            Some(Intent::PositionChanged { x, y, .. }) => {
                assert_approx_eq!(x, 407.0, 1e-4);
                assert_approx_eq!(y, 400.0, 1e-4);
            }
            other => panic!("unexpected intent {other:?}"),
        }
        assert_approx_eq!(world.actor(1).unwrap().position.x, 407.0, 1e-4);
    }

    #[test]
    fn test_slow_halves_speed() {
        let mut world = open_world();
        world.insert_actor(Actor::new(1, Vector2::new(400.0, 400.0)));
        let resolver = MotionResolver::default();
        let mut input = holding(&[Direction::Down]);
        input.slow = true;

        resolver.move_actor(&mut world, 1, &input, 1.0);
        assert_approx_eq!(world.actor(1).unwrap().position.y, 435.0, 1e-4);
    }

    #[test]
    fn test_rejected_move_is_idempotent() {
        let mut world = reference_world();
        // tile (9,8) is a wall starting at x = 450
        let start = Vector2::new(435.0, 425.0);
        world.insert_actor(Actor::new(1, start));
        let resolver = MotionResolver::default();
        let input = holding(&[Direction::Right]);

        for _ in 0..3 {
            assert_eq!(resolver.move_actor(&mut world, 1, &input, 0.1), None);
            assert_eq!(world.actor(1).unwrap().position, start);
        }
    }

    #[test]
    fn test_move_without_input_or_actor() {
        let mut world = open_world();
        world.insert_actor(Actor::new(1, Vector2::new(400.0, 400.0)));
        let resolver = MotionResolver::default();
        assert_eq!(resolver.move_actor(&mut world, 1, &MoveInput::default(), 0.1), None);
        assert_eq!(
            resolver.move_actor(&mut world, 2, &holding(&[Direction::Up]), 0.1),
            None
        );
    }

    #[test]
    fn test_fire_requires_aim() {
        let mut world = open_world();
        world.insert_actor(Actor::new(1, Vector2::new(100.0, 100.0)));
        let resolver = MotionResolver::default();

        assert!(!resolver.fire(&mut world, 1, Vector2::new(100.0, 100.0)));
        assert!(!resolver.fire(&mut world, 2, Vector2::new(0.0, 0.0)));
        assert!(world.projectiles.is_empty());

        assert!(resolver.fire(&mut world, 1, Vector2::new(100.0, 300.0)));
        let projectile = &world.projectiles[0];
        assert_eq!(projectile.owner, 1);
        assert_approx_eq!(projectile.velocity.x, 0.0);
        assert_approx_eq!(projectile.velocity.y, BULLET_SPEED);
    }

    fn resting_projectile(owner: u32, x: f32, y: f32) -> Projectile {
        Projectile {
            owner,
            position: Vector2::new(x, y),
            velocity: Vector2::ZERO,
        }
    }

    #[test]
    fn test_hit_boundary_is_exclusive() {
        let mut world = open_world();
        world.insert_actor(Actor::new(2, Vector2::new(200.0, 200.0)));
        world.projectiles.push(resting_projectile(1, 210.0, 200.0));
        let resolver = MotionResolver::default();

        assert!(resolver.step_projectiles(&mut world, 0.016).is_empty());
        assert_eq!(world.projectiles.len(), 1);

        world.projectiles[0].position = Vector2::new(209.9, 200.0);
        let intents = resolver.step_projectiles(&mut world, 0.016);
        assert_eq!(
            intents,
            vec![Intent::HitScored {
                target_id: 2,
                strength: HIT_DAMAGE
            }]
        );
        assert!(world.projectiles.is_empty());
    }

    #[test]
    fn test_server_authority_leaves_health_alone() {
        let mut world = open_world();
        world.insert_actor(Actor::new(2, Vector2::new(200.0, 200.0)));
        world.projectiles.push(resting_projectile(1, 201.0, 200.0));

        MotionResolver::new(HitAuthority::Server).step_projectiles(&mut world, 0.016);
        assert_eq!(world.actor(2).unwrap().health, 1.0);
    }

    #[test]
    fn test_local_authority_applies_damage() {
        let mut world = open_world();
        world.insert_actor(Actor::new(2, Vector2::new(200.0, 200.0)));
        world.projectiles.push(resting_projectile(1, 201.0, 200.0));

        MotionResolver::new(HitAuthority::Local).step_projectiles(&mut world, 0.016);
        assert_approx_eq!(world.actor(2).unwrap().health, 0.9);
    }

    #[test]
    fn test_one_hit_on_the_nearest_actor() {
        let mut world = open_world();
        world.insert_actor(Actor::new(2, Vector2::new(200.0, 200.0)));
        world.insert_actor(Actor::new(3, Vector2::new(206.0, 200.0)));
        world.projectiles.push(resting_projectile(1, 204.0, 200.0));

        let intents = MotionResolver::default().step_projectiles(&mut world, 0.016);
        assert_eq!(intents.len(), 1);
        assert!(matches!(intents[0], Intent::HitScored { target_id: 3, .. }));
    }

    #[test]
    fn test_owner_is_never_hit() {
        let mut world = open_world();
        world.insert_actor(Actor::new(1, Vector2::new(200.0, 200.0)));
        world.projectiles.push(resting_projectile(1, 200.0, 200.0));

        assert!(MotionResolver::default()
            .step_projectiles(&mut world, 0.016)
            .is_empty());
        assert_eq!(world.projectiles.len(), 1);
    }

    #[test]
    fn test_projectile_stops_at_wall() {
        let mut world = reference_world();
        // travelling left from open floor into the outer wall column
        world.projectiles.push(Projectile {
            owner: 1,
            position: Vector2::new(55.0, 75.0),
            velocity: Vector2::new(-BULLET_SPEED, 0.0),
        });
        let resolver = MotionResolver::default();
        resolver.step_projectiles(&mut world, 0.02);
        assert!(world.projectiles.is_empty());
    }

    #[test]
    fn test_projectile_leaving_bounds_is_destroyed() {
        let mut world = open_world();
        world.projectiles.push(Projectile {
            owner: 1,
            position: Vector2::new(795.0, 400.0),
            velocity: Vector2::new(BULLET_SPEED, 0.0),
        });
        MotionResolver::default().step_projectiles(&mut world, 0.02);
        assert!(world.projectiles.is_empty());
    }

    #[test]
    fn test_ramp_health_clamps() {
        let mut world = open_world();
        world.insert_actor(Actor::new(1, Vector2::new(400.0, 400.0)));
        let resolver = MotionResolver::default();

        assert!(resolver.ramp_health(&mut world, 1, -1.0, 1.0));
        assert_approx_eq!(world.actor(1).unwrap().health, 0.8);
        assert!(resolver.ramp_health(&mut world, 1, 1.0, 10.0));
        assert_eq!(world.actor(1).unwrap().health, 1.0);
        assert!(!resolver.ramp_health(&mut world, 9, 1.0, 1.0));
    }

    #[test]
    fn test_intent_packets() {
        let intent = Intent::PositionChanged {
            x: 1.0,
            y: 2.0,
            rotation: 0.5,
        };
        assert_eq!(
            intent.into_packet(),
            Packet::Position {
                x: 1.0,
                y: 2.0,
                rotation: 0.5
            }
        );
    }
}
