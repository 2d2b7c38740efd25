//! Windowed instrument: winit event loop driving the frame scheduler.

use std::sync::Arc;

use adi_core::{
    ExitStatus, FrameOutcome, FrameScheduler, SchedulerContext, TelemetryLink, TelemetryRegister,
};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::renderer::BallRenderer;

type StartTelemetry = Box<dyn FnOnce(Arc<TelemetryRegister>) -> anyhow::Result<Box<dyn TelemetryLink>>>;

pub struct InstrumentApp {
    ctx: Option<SchedulerContext>,
    start_telemetry: Option<StartTelemetry>,
    scheduler: Option<FrameScheduler<BallRenderer>>,
    status: Option<ExitStatus>,
}

impl InstrumentApp {
    pub fn new(ctx: SchedulerContext, start_telemetry: StartTelemetry) -> Self {
        Self {
            ctx: Some(ctx),
            start_telemetry: Some(start_telemetry),
            scheduler: None,
            status: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(ctx), Some(start_telemetry)) = (self.ctx.take(), self.start_telemetry.take())
        else {
            return;
        };

        let display = ctx.config.display.clone();
        let start_renderer = || -> anyhow::Result<BallRenderer> {
            let attrs = Window::default_attributes()
                .with_title(display.title.as_str())
                .with_inner_size(PhysicalSize::new(display.window_width, display.window_height));
            let window = Arc::new(event_loop.create_window(attrs)?);
            pollster::block_on(BallRenderer::windowed(window, &display))
        };

        match FrameScheduler::initialize(ctx, start_telemetry, start_renderer) {
            Ok(scheduler) => {
                if let Some(window) = scheduler.renderer().window() {
                    window.request_redraw();
                }
                self.scheduler = Some(scheduler);
            }
            Err(e) => {
                tracing::error!("{}", e);
                self.status = Some(ExitStatus::InitFailed);
                event_loop.exit();
            }
        }
    }

    fn request_stop(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.shutdown_signal().request();
        }
    }

    fn finish(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(scheduler) = self.scheduler.take() {
            self.status = Some(scheduler.shutdown());
        }
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(scheduler) = &mut self.scheduler else {
            return;
        };

        if scheduler.step() == FrameOutcome::Stopped {
            self.finish(event_loop);
            return;
        }

        if let Some(window) = scheduler.renderer().window() {
            window.request_redraw();
        }
    }

    pub fn status(&self) -> Option<ExitStatus> {
        self.status
    }
}

impl ApplicationHandler for InstrumentApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.scheduler.is_none() {
            self.start(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.request_stop(),

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    self.request_stop();
                }
            }

            WindowEvent::Resized(size) => {
                if let Some(scheduler) = &mut self.scheduler {
                    scheduler.renderer_mut().resize(size);
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        // a hidden window gets no redraws, so external stop requests are polled here
        let Some(scheduler) = &self.scheduler else {
            return;
        };
        if !scheduler.shutdown_signal().is_requested() {
            return;
        }
        match scheduler.renderer().window().cloned() {
            Some(window) => window.request_redraw(),
            None => self.finish(event_loop),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(scheduler) = self.scheduler.take() {
            self.status = Some(scheduler.shutdown());
        }
    }
}

/// Run the windowed instrument until it is closed or a shutdown is
/// requested through the context's signal.
pub fn run<F>(ctx: SchedulerContext, start_telemetry: F) -> anyhow::Result<ExitStatus>
where
    F: FnOnce(Arc<TelemetryRegister>) -> anyhow::Result<Box<dyn TelemetryLink>> + 'static,
{
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = InstrumentApp::new(ctx, Box::new(start_telemetry));
    event_loop.run_app(&mut app)?;

    Ok(app.status().unwrap_or(ExitStatus::Clean))
}
