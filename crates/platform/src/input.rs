//! Keyboard and mouse state accumulated between frames.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other,
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        match button {
            winit::event::MouseButton::Left => MouseButton::Left,
            winit::event::MouseButton::Right => MouseButton::Right,
            winit::event::MouseButton::Middle => MouseButton::Middle,
            _ => MouseButton::Other,
        }
    }
}

/// Pressed keys and buttons, plus the cursor motion since the last frame.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    pressed_buttons: HashSet<MouseButton>,
    /// `None` until the first cursor event.
    mouse_position: Option<(f32, f32)>,
    mouse_delta: (f32, f32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame motion. Call after the frame consumed it.
    pub fn begin_frame(&mut self) {
        self.mouse_delta = (0.0, 0.0);
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        self.pressed_keys.insert(key);
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        self.pressed_buttons.insert(button);
    }

    pub fn on_mouse_released(&mut self, button: MouseButton) {
        self.pressed_buttons.remove(&button);
    }

    /// Several cursor events may arrive per frame; their motion adds up.
    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        if let Some((old_x, old_y)) = self.mouse_position {
            self.mouse_delta.0 += x - old_x;
            self.mouse_delta.1 += y - old_y;
        }
        self.mouse_position = Some((x, y));
    }

    /// Focus loss: forget held keys so nothing keeps moving.
    pub fn release_all(&mut self) {
        self.pressed_keys.clear();
        self.pressed_buttons.clear();
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }

    /// Cursor motion while `button` is held, if any.
    pub fn drag(&self, button: MouseButton) -> Option<(f32, f32)> {
        self.is_mouse_pressed(button).then_some(self.mouse_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_move_has_no_delta() {
        let mut input = InputState::new();
        input.on_mouse_moved(100.0, 50.0);
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_motion_accumulates_until_begin_frame() {
        let mut input = InputState::new();
        input.on_mouse_moved(0.0, 0.0);
        input.on_mouse_moved(3.0, 1.0);
        input.on_mouse_moved(5.0, -2.0);
        assert_eq!(input.mouse_delta(), (5.0, -2.0));
        input.begin_frame();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_drag_requires_button() {
        let mut input = InputState::new();
        input.on_mouse_moved(0.0, 0.0);
        input.on_mouse_moved(4.0, 0.0);
        assert_eq!(input.drag(MouseButton::Left), None);
        input.on_mouse_pressed(MouseButton::Left);
        assert_eq!(input.drag(MouseButton::Left), Some((4.0, 0.0)));
    }

    #[test]
    fn test_release_all() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);
        input.on_mouse_pressed(MouseButton::Left);
        input.release_all();
        assert!(!input.is_key_pressed(KeyCode::KeyW));
        assert!(!input.is_mouse_pressed(MouseButton::Left));
    }
}
