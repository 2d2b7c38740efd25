//! Frame scheduling: ordered startup, the per-frame update/draw step, and
//! reverse-order teardown.
//!
//! The scheduler owns every collaborator it starts. Telemetry comes up
//! first, then the rendering pipeline, then the mesh; shutdown releases them
//! in the opposite order and never fails.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::attitude::{AngularState, Easing};
use crate::clock::{FrameClock, MonotonicClock};
use crate::config::AdiConfig;
use crate::error::{AdiError, AdiResult};
use crate::mesh::InstrumentMesh;
use crate::telemetry::TelemetryRegister;

/// Operator stop request, checked once per frame.
#[derive(Clone, Debug, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    ShuttingDown,
    Terminated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    Clean,
    InitFailed,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Clean => 0,
            ExitStatus::InitFailed => 1,
        }
    }
}

/// Opaque handle to a mesh uploaded by the rendering pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u32);

/// Everything the renderer needs for one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameInputs {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub fps: f32,
    pub frame: u64,
}

/// Rasterizer collaborator. `draw` returns once the frame is queued for
/// presentation.
pub trait RenderPipeline {
    fn upload_mesh(&mut self, mesh: &InstrumentMesh) -> anyhow::Result<MeshHandle>;
    fn draw(&mut self, mesh: MeshHandle, frame: &FrameInputs) -> anyhow::Result<()>;
    fn release_mesh(&mut self, mesh: MeshHandle) -> anyhow::Result<()>;
    fn shutdown(&mut self) -> anyhow::Result<()>;
}

/// Running telemetry transport. Writes into the register from its own thread
/// until shut down.
pub trait TelemetryLink {
    fn shutdown(&mut self) -> anyhow::Result<()>;
}

/// Shared objects handed to the scheduler by the process entry point.
#[derive(Clone)]
pub struct SchedulerContext {
    pub config: AdiConfig,
    pub telemetry: Arc<TelemetryRegister>,
    pub shutdown: ShutdownSignal,
    pub clock: MonotonicClock,
}

impl SchedulerContext {
    pub fn new(config: AdiConfig) -> Self {
        let clock = MonotonicClock::new();
        Self {
            config,
            telemetry: Arc::new(TelemetryRegister::new(clock)),
            shutdown: ShutdownSignal::new(),
            clock,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The renderer rejected the frame; the loop carries on
    Skipped,
    /// Shutdown was observed; call `shutdown`
    Stopped,
}

pub struct FrameScheduler<R: RenderPipeline> {
    state: SchedulerState,
    telemetry: Arc<TelemetryRegister>,
    shutdown: ShutdownSignal,
    clock: MonotonicClock,
    easing: Easing,
    view: Mat4,
    projection: Mat4,
    camera_position: Vec3,
    attitude: AngularState,
    frame_clock: FrameClock,
    link: Box<dyn TelemetryLink>,
    renderer: R,
    mesh: Option<(InstrumentMesh, MeshHandle)>,
}

impl<R: RenderPipeline> FrameScheduler<R> {
    /// Bring up telemetry, the renderer and the mesh, in that order.
    /// Anything already started is torn down if a later stage fails.
    pub fn initialize<FL, FR>(
        ctx: SchedulerContext,
        start_telemetry: FL,
        start_renderer: FR,
    ) -> AdiResult<Self>
    where
        FL: FnOnce(Arc<TelemetryRegister>) -> anyhow::Result<Box<dyn TelemetryLink>>,
        FR: FnOnce() -> anyhow::Result<R>,
    {
        tracing::info!("Initializing instrument");
        ctx.config.validate()?;

        let mut link = start_telemetry(Arc::clone(&ctx.telemetry))
            .map_err(|e| AdiError::init("telemetry", &e))?;

        let mut renderer = match start_renderer() {
            Ok(r) => r,
            Err(e) => {
                release("telemetry", link.shutdown());
                return Err(AdiError::init("renderer", &e));
            }
        };

        let mesh = InstrumentMesh::from_options(&ctx.config.ball);
        let handle = match renderer.upload_mesh(&mesh) {
            Ok(h) => h,
            Err(e) => {
                release("renderer", renderer.shutdown());
                release("telemetry", link.shutdown());
                return Err(AdiError::init("mesh", &e));
            }
        };
        tracing::info!(
            "Ball mesh uploaded: {} vertices, {} indices",
            mesh.num_verts(),
            mesh.num_indexes()
        );

        let display = &ctx.config.display;
        let frame_clock = FrameClock::new(ctx.clock.now_nanos());

        Ok(Self {
            state: SchedulerState::Running,
            telemetry: ctx.telemetry,
            shutdown: ctx.shutdown,
            clock: ctx.clock,
            easing: ctx.config.easing,
            view: display.view(),
            projection: display.projection(),
            camera_position: display.camera(),
            attitude: AngularState::level(),
            frame_clock,
            link,
            renderer,
            mesh: Some((mesh, handle)),
        })
    }

    /// Run one iteration of the frame loop.
    pub fn step(&mut self) -> FrameOutcome {
        if self.state != SchedulerState::Running {
            return FrameOutcome::Stopped;
        }
        if self.shutdown.is_requested() {
            tracing::info!("Shutdown requested after {} frames", self.frame_clock.frames());
            self.state = SchedulerState::ShuttingDown;
            return FrameOutcome::Stopped;
        }

        if let Some(fps) = self.frame_clock.tick(self.clock.now_nanos()) {
            tracing::info!("FPS: {:.2}", fps);
        }

        self.attitude
            .set_targets_from_telemetry(&self.telemetry.snapshot());
        self.attitude.advance(&self.easing);

        let Some(handle) = self.mesh.as_ref().map(|(_, h)| *h) else {
            return FrameOutcome::Skipped;
        };
        let inputs = FrameInputs {
            model: self.attitude.model_matrix(),
            view: self.view,
            projection: self.projection,
            camera_position: self.camera_position,
            fps: self.frame_clock.fps(),
            frame: self.frame_clock.frames(),
        };

        match self.renderer.draw(handle, &inputs) {
            Ok(()) => FrameOutcome::Presented,
            Err(e) => {
                tracing::warn!("Frame {} dropped: {:#}", inputs.frame, e);
                FrameOutcome::Skipped
            }
        }
    }

    /// Step until shutdown is requested, or until `max_frames` frames have
    /// run, then tear down.
    pub fn run(mut self, max_frames: Option<u64>) -> ExitStatus {
        loop {
            if max_frames.is_some_and(|max| self.frame_clock.frames() >= max) {
                self.shutdown.request();
            }
            if self.step() == FrameOutcome::Stopped {
                break;
            }
        }
        self.shutdown()
    }

    /// Release mesh, renderer and telemetry, in that order. Failures are
    /// logged and skipped.
    pub fn shutdown(mut self) -> ExitStatus {
        self.state = SchedulerState::ShuttingDown;

        if let Some((mesh, handle)) = self.mesh.take() {
            release("mesh", self.renderer.release_mesh(handle));
            drop(mesh);
        }
        release("renderer", self.renderer.shutdown());
        release("telemetry", self.link.shutdown());

        self.state = SchedulerState::Terminated;
        tracing::info!("Instrument shut down");
        ExitStatus::Clean
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn attitude(&self) -> &AngularState {
        &self.attitude
    }

    pub fn frame_clock(&self) -> &FrameClock {
        &self.frame_clock
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }
}

fn release(what: &str, result: anyhow::Result<()>) {
    if let Err(e) = result {
        tracing::warn!("Failed to release {}: {:#}", what, e);
    }
}

/// Initialize, loop and tear down on the calling thread.
pub fn run_blocking<R, FL, FR>(
    ctx: SchedulerContext,
    start_telemetry: FL,
    start_renderer: FR,
    max_frames: Option<u64>,
) -> ExitStatus
where
    R: RenderPipeline,
    FL: FnOnce(Arc<TelemetryRegister>) -> anyhow::Result<Box<dyn TelemetryLink>>,
    FR: FnOnce() -> anyhow::Result<R>,
{
    match FrameScheduler::initialize(ctx, start_telemetry, start_renderer) {
        Ok(scheduler) => scheduler.run(max_frames),
        Err(e) => {
            tracing::error!("{}", e);
            ExitStatus::InitFailed
        }
    }
}
