//! Platform layer: winit window, Vulkan surface and input state.

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{
    DEFAULT_HEIGHT, DEFAULT_WIDTH, Surface, Window, required_extensions, window_title,
};

pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
