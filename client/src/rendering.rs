use crate::game::ClientGameState;
use macroquad::prelude::*;
use shared::{Actor, OcclusionMask, Projectile, PLAYER_RADIUS, SHADOW_OPACITY};

/// Side length of one occlusion mask cell, in pixels
const MASK_CELL_SIZE: f32 = 4.0;

const BACKGROUND: Color = Color::new(1.0, 1.0, 1.0, 1.0);
const WALL_FILL: Color = Color::new(0.9, 0.0, 0.0, 1.0);
const BULLET_COLOR: Color = Color::new(0.2, 0.2, 0.2, 1.0);

#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Server being played on, `None` when offline
    pub server: Option<String>,
    pub fake_ping_ms: u64,
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn render(&mut self, state: &ClientGameState, config: &RenderConfig) {
        clear_background(BACKGROUND);

        let (Some(local), Some(grid)) = (state.local_actor(), state.world.grid()) else {
            self.draw_waiting(state, config);
            return;
        };

        if let Some(mask) = state.world.occlusion_mask(local.position, MASK_CELL_SIZE) {
            self.draw_shadow(&mask);
        }

        for rect in grid.wall_rects() {
            draw_rectangle(rect.left, rect.top, rect.width(), rect.height(), WALL_FILL);
            draw_rectangle_lines(rect.left, rect.top, rect.width(), rect.height(), 1.0, BLACK);
        }

        // Occluded players are not drawn at all
        for actor in state.world.visible_actors(local.id) {
            self.draw_player(actor);
        }
        self.draw_player(local);

        for projectile in &state.world.projectiles {
            self.draw_bullet(projectile);
        }

        self.draw_ui(state, config);
    }

    fn draw_shadow(&mut self, mask: &OcclusionMask) {
        let shade = Color::new(0.0, 0.0, 0.0, SHADOW_OPACITY);
        for run in mask.runs() {
            draw_rectangle(run.left, run.top, run.width(), run.height(), shade);
        }
    }

    fn draw_player(&mut self, actor: &Actor) {
        let (x, y) = (actor.position.x, actor.position.y);
        draw_circle(x, y, PLAYER_RADIUS, BLACK);

        // Two arms pointing along the facing direction
        let (sin, cos) = actor.rotation.sin_cos();
        let local_to_world = |lx: f32, ly: f32| (x + cos * lx - sin * ly, y + sin * lx + cos * ly);
        for side in [-10.0, 10.0] {
            let (x0, y0) = local_to_world(2.0, side);
            let (x1, y1) = local_to_world(14.0, side);
            draw_line(x0, y0, x1, y1, 2.0, BLACK);
        }

        self.draw_health_bar(x, y, actor.health);
    }

    fn draw_health_bar(&mut self, x: f32, y: f32, health: f32) {
        let health = health.clamp(0.0, 1.0);
        let (left, top, width, height) = (x - 20.0, y - 35.0, 40.0, 8.0);
        let fill = Color::new(
            (2.0 * (1.0 - health)).min(1.0),
            (2.0 * health).min(1.0),
            0.0,
            1.0,
        );

        draw_rectangle(left, top, width, height, WHITE);
        draw_rectangle(left, top, width * health, height, fill);
        draw_rectangle_lines(left, top, width, height, 1.0, BLACK);
    }

    fn draw_bullet(&mut self, projectile: &Projectile) {
        draw_circle(projectile.position.x, projectile.position.y, 1.0, BULLET_COLOR);
    }

    fn draw_waiting(&mut self, state: &ClientGameState, config: &RenderConfig) {
        let message = match (state.disconnect_reason(), &config.server) {
            (Some(reason), _) => format!("Disconnected: {}", reason),
            (None, Some(server)) => format!("Connecting to {}...", server),
            (None, None) => "Loading...".to_string(),
        };
        let size = measure_text(&message, None, 24, 1.0);
        draw_text(
            &message,
            (self.width - size.width) / 2.0,
            self.height / 2.0,
            24.0,
            DARKGRAY,
        );
    }

    fn draw_ui(&mut self, state: &ClientGameState, config: &RenderConfig) {
        let mode = if state.pointer_movement() {
            "pointer"
        } else {
            "screen"
        };
        let status = match (&config.server, state.client_id) {
            (Some(server), Some(id)) => format!("{} as #{}", server, id),
            (Some(server), None) => format!("{} (no id)", server),
            (None, _) => "offline".to_string(),
        };

        let mut lines = vec![
            status,
            format!("{} players, movement: {} [P]", state.world.actor_count(), mode),
        ];
        if config.fake_ping_ms > 0 {
            lines.push(format!("fake ping {}ms", config.fake_ping_ms));
        }
        if let Some(error) = state.last_error() {
            lines.push(format!("server: {}", error));
        }

        for (i, line) in lines.iter().enumerate() {
            draw_text(line, 10.0, self.height - 10.0 - i as f32 * 14.0, 14.0, DARKGRAY);
        }
    }
}
