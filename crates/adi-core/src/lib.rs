//! Attitude ball core: geometry, circular easing toward telemetry targets,
//! and the frame scheduler that ties them to a rendering pipeline.
//!
//! Nothing here touches a GPU or a socket. Renderers and telemetry
//! transports plug in through [`RenderPipeline`] and [`TelemetryLink`].

pub mod attitude;
pub mod clock;
pub mod config;
pub mod error;
pub mod mesh;
pub mod scheduler;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use attitude::{ease_circular, shortest_delta, wrap_angle, AngularState, Axis, AxisMapping, Easing, LEVEL_FLIGHT};
pub use clock::{FrameClock, MonotonicClock, FPS_WINDOW_FRAMES};
pub use config::{AdiConfig, DisplayConfig, TelemetryConfig, TopicAction, TopicConfig};
pub use error::{AdiError, AdiResult};
pub use mesh::{generate, BallOptions, InstrumentMesh};
pub use scheduler::{
    run_blocking, ExitStatus, FrameInputs, FrameOutcome, FrameScheduler, MeshHandle, RenderPipeline,
    SchedulerContext, SchedulerState, ShutdownSignal, TelemetryLink,
};
pub use telemetry::{AxisSample, TelemetryRegister, TelemetrySample};
