//! GPU rendering for the attitude indicator.
//!
//! [`BallRenderer`] implements [`adi_core::RenderPipeline`] on top of wgpu,
//! either into a winit window or into an offscreen texture.

pub mod capture;
pub mod headless;
pub mod overlay;
pub mod pipeline;
pub mod renderer;
pub mod texture;
pub mod window;

pub use headless::{run_headless, HeadlessOptions};
pub use renderer::BallRenderer;
pub use window::run;
