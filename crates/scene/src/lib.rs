//! Camera and light state for the demos.
//!
//! Pure math on `glam` types; nothing here touches the GPU.

pub mod camera;
pub mod light;

pub use camera::{Camera, FlyController, Movement, Projection};
pub use light::ShadowLight;
