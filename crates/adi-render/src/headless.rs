//! Offscreen instrument for machines without a display.

use std::path::PathBuf;
use std::sync::Arc;

use adi_core::{run_blocking, ExitStatus, SchedulerContext, TelemetryLink, TelemetryRegister};

use crate::renderer::BallRenderer;

#[derive(Clone, Debug, Default)]
pub struct HeadlessOptions {
    /// Stop after this many frames; otherwise run until a shutdown request
    pub max_frames: Option<u64>,
    /// Write the final frame here as a PNG
    pub snapshot: Option<PathBuf>,
}

/// Run the full frame loop against an offscreen target of the configured
/// window size, on the calling thread.
pub fn run_headless<F>(ctx: SchedulerContext, start_telemetry: F, options: HeadlessOptions) -> ExitStatus
where
    F: FnOnce(Arc<TelemetryRegister>) -> anyhow::Result<Box<dyn TelemetryLink>>,
{
    let display = ctx.config.display.clone();
    let HeadlessOptions {
        max_frames,
        snapshot,
    } = options;

    run_blocking(
        ctx,
        start_telemetry,
        || {
            pollster::block_on(BallRenderer::offscreen(
                display.window_width,
                display.window_height,
                &display,
                snapshot,
            ))
        },
        max_frames,
    )
}
