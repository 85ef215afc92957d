//! Keyboard sampling and hot-key edge detection

use macroquad::prelude::*;
use shared::Controls;

/// Raw key states for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub jump: bool,
    pub dash: bool,
    pub pause: bool,
    pub speed_up: bool,
    pub slow_down: bool,
    pub quit: bool,
}

impl KeyState {
    /// Reads the current keyboard state from macroquad.
    pub fn sample() -> Self {
        Self {
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            jump: is_key_down(KeyCode::Space),
            dash: is_key_down(KeyCode::LeftShift) || is_key_down(KeyCode::RightShift),
            pause: is_key_down(KeyCode::P),
            speed_up: is_key_down(KeyCode::Equal) || is_key_down(KeyCode::KpAdd),
            slow_down: is_key_down(KeyCode::Minus) || is_key_down(KeyCode::KpSubtract),
            quit: is_key_down(KeyCode::Q) || is_key_down(KeyCode::Escape),
        }
    }
}

/// One-shot actions triggered on key press, not while held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HotKeys {
    pub toggle_pause: bool,
    pub speed_up: bool,
    pub slow_down: bool,
    pub quit: bool,
}

/// Turns raw key states into movement controls and hot-key presses
#[derive(Debug, Default)]
pub struct InputManager {
    previous: KeyState,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, keys: KeyState) -> (Controls, HotKeys) {
        let pressed = |now: bool, before: bool| now && !before;

        let hot_keys = HotKeys {
            toggle_pause: pressed(keys.pause, self.previous.pause),
            speed_up: pressed(keys.speed_up, self.previous.speed_up),
            slow_down: pressed(keys.slow_down, self.previous.slow_down),
            quit: keys.quit,
        };
        self.previous = keys;

        let controls = Controls {
            left: keys.left,
            right: keys.right,
            up: keys.up,
            down: keys.down,
            jump: keys.jump,
            dash_left: keys.dash && keys.left,
            dash_right: keys.dash && keys.right,
        };

        (controls, hot_keys)
    }
}
