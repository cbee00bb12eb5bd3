//! Per-frame input sampling with edge detection for toggle keys

use macroquad::prelude::*;
use shared::{Direction, Vector2};
use std::collections::HashSet;

/// Everything the player did during one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    pub held: HashSet<Direction>,
    pub slow: bool,
    pub health_up: bool,
    pub health_down: bool,
    pub fire: bool,
    pub pointer: Option<Vector2>,
    pub toggle_pointer_movement: bool,
    pub quit: bool,
}

/// Samples keyboard and mouse state from macroquad once per frame
pub struct InputManager {
    // Previous frame key states for edge detection
    prev_key_p: bool,
    prev_mouse_left: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            prev_key_p: false,
            prev_mouse_left: false,
        }
    }

    pub fn update(&mut self) -> FrameInput {
        let held = held_directions(
            is_key_down(KeyCode::W),
            is_key_down(KeyCode::A),
            is_key_down(KeyCode::S),
            is_key_down(KeyCode::D),
        );

        let key_p = is_key_down(KeyCode::P);
        let mouse_left = is_mouse_button_down(MouseButton::Left);
        let (pointer_x, pointer_y) = mouse_position();

        FrameInput {
            held,
            slow: is_key_down(KeyCode::LeftShift),
            health_up: is_key_down(KeyCode::Up),
            health_down: is_key_down(KeyCode::Down),
            fire: rising_edge(mouse_left, &mut self.prev_mouse_left),
            pointer: Some(Vector2::new(pointer_x, pointer_y)),
            toggle_pointer_movement: rising_edge(key_p, &mut self.prev_key_p),
            quit: is_key_pressed(KeyCode::Escape),
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// True only on the frame the key goes down
fn rising_edge(current: bool, previous: &mut bool) -> bool {
    let pressed = current && !*previous;
    *previous = current;
    pressed
}

fn held_directions(up: bool, left: bool, down: bool, right: bool) -> HashSet<Direction> {
    [
        (up, Direction::Up),
        (left, Direction::Left),
        (down, Direction::Down),
        (right, Direction::Right),
    ]
    .into_iter()
    .filter(|(down, _)| *down)
    .map(|(_, direction)| direction)
    .collect()
}
