//! The contract the engine core implements.

use crate::platform::{Capabilities, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Control,
    Space,
    Return,
    Up,
    Down,
    Left,
    Right,
    Escape,
    C,
    S,
    L,
    H,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
}

/// One input event queued for delivery at the start of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyPress(Key),
    KeyRelease(Key),
    MousePress { button: MouseButton, x: i32, y: i32 },
    MouseRelease { button: MouseButton, x: i32, y: i32 },
    MouseMove { x: i32, y: i32 },
    TouchCancel,
    SwipeUp,
    SwipeDown,
}

/// Calls from the presentation layer into the engine core.
///
/// Only the lifecycle hooks see the [`Platform`]; input handlers record
/// state for the next `on_frame`.
pub trait EngineCore {
    /// Called once before the first frame. Returning `false` aborts startup.
    fn on_init(&mut self, platform: &mut dyn Platform, capabilities: &Capabilities) -> bool;

    /// Run one frame. Returning `false` ends the loop.
    fn on_frame(&mut self, platform: &mut dyn Platform) -> bool;

    fn on_cleanup(&mut self, _platform: &mut dyn Platform) {}

    fn on_key_press(&mut self, _key: Key) {}
    fn on_key_release(&mut self, _key: Key) {}
    fn on_mouse_press(&mut self, _button: MouseButton, _x: i32, _y: i32) {}
    fn on_mouse_release(&mut self, _button: MouseButton, _x: i32, _y: i32) {}
    fn on_mouse_move(&mut self, _x: i32, _y: i32) {}
    fn on_touch_cancel(&mut self) {}
    fn on_swipe_up(&mut self) {}
    fn on_swipe_down(&mut self) {}
}

impl InputEvent {
    /// Deliver this event to `core`.
    pub fn dispatch(self, core: &mut dyn EngineCore) {
        match self {
            InputEvent::KeyPress(key) => core.on_key_press(key),
            InputEvent::KeyRelease(key) => core.on_key_release(key),
            InputEvent::MousePress { button, x, y } => core.on_mouse_press(button, x, y),
            InputEvent::MouseRelease { button, x, y } => core.on_mouse_release(button, x, y),
            InputEvent::MouseMove { x, y } => core.on_mouse_move(x, y),
            InputEvent::TouchCancel => core.on_touch_cancel(),
            InputEvent::SwipeUp => core.on_swipe_up(),
            InputEvent::SwipeDown => core.on_swipe_down(),
        }
    }
}
