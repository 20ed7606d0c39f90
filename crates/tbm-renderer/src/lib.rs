pub mod camera;
pub mod frame;
pub mod geometry;
pub mod hud;
pub mod math;
pub mod pipeline;
pub mod renderer;
pub mod stages;

pub use renderer::SceneRenderer;
