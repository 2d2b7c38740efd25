use std::f32::consts::PI;
use std::sync::{Arc, Mutex};

use crate::attitude::*;
use crate::config::AdiConfig;
use crate::error::AdiError;
use crate::mesh::InstrumentMesh;
use crate::scheduler::*;
use crate::telemetry::TelemetryRegister;

type Log = Arc<Mutex<Vec<String>>>;

fn push(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[derive(Default)]
struct RecordingPipeline {
    log: Log,
    fail_upload: bool,
    fail_draw: bool,
    fail_shutdown: bool,
    draws: u64,
    last_frame: Option<FrameInputs>,
    stop_during_draw: Option<ShutdownSignal>,
}

impl RenderPipeline for RecordingPipeline {
    fn upload_mesh(&mut self, mesh: &InstrumentMesh) -> anyhow::Result<MeshHandle> {
        if self.fail_upload {
            anyhow::bail!("out of buffer memory");
        }
        push(&self.log, format!("upload {}", mesh.num_indexes()));
        Ok(MeshHandle(7))
    }

    fn draw(&mut self, mesh: MeshHandle, frame: &FrameInputs) -> anyhow::Result<()> {
        assert_eq!(mesh, MeshHandle(7));
        if let Some(signal) = &self.stop_during_draw {
            signal.request();
        }
        if self.fail_draw {
            anyhow::bail!("surface lost");
        }
        self.draws += 1;
        self.last_frame = Some(*frame);
        Ok(())
    }

    fn release_mesh(&mut self, mesh: MeshHandle) -> anyhow::Result<()> {
        push(&self.log, format!("release mesh {}", mesh.0));
        Ok(())
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        push(&self.log, "renderer down");
        if self.fail_shutdown {
            anyhow::bail!("display already gone");
        }
        Ok(())
    }
}

struct RecordingLink {
    log: Log,
}

impl TelemetryLink for RecordingLink {
    fn shutdown(&mut self) -> anyhow::Result<()> {
        push(&self.log, "telemetry down");
        Ok(())
    }
}

fn start_link(log: &Log) -> impl FnOnce(Arc<TelemetryRegister>) -> anyhow::Result<Box<dyn TelemetryLink>> {
    let log = Arc::clone(log);
    move |_register| {
        push(&log, "telemetry up");
        Ok(Box::new(RecordingLink { log }) as Box<dyn TelemetryLink>)
    }
}

fn pipeline(log: &Log) -> RecordingPipeline {
    RecordingPipeline {
        log: Arc::clone(log),
        ..Default::default()
    }
}

#[test]
fn test_mid_scale_pitch_is_level() {
    let ctx = SchedulerContext::new(AdiConfig::default());
    ctx.telemetry.on_axis_update(Axis::Pitch, 32768);

    let mut state = AngularState::level();
    state.set_targets_from_telemetry(&ctx.telemetry.snapshot());
    assert!((state.target_pitch - 3.1416).abs() < 1e-3);

    let before = state.pitch;
    state.advance(&Easing::default());
    assert!((state.pitch - before).abs() < 1e-4);
}

#[test]
fn test_reset_returns_to_level() {
    let ctx = SchedulerContext::new(AdiConfig::default());
    ctx.telemetry.on_axis_update(Axis::Pitch, 1000);
    ctx.telemetry.on_axis_update(Axis::Bank, 50000);

    let mut state = AngularState::level();
    state.set_targets_from_telemetry(&ctx.telemetry.snapshot());
    assert!(state.target_pitch != LEVEL_FLIGHT);
    assert!(state.target_bank != LEVEL_FLIGHT);

    ctx.telemetry.on_session_reset();
    let sample = ctx.telemetry.snapshot();
    assert_eq!(sample.pitch.updated_at_nanos, 0);
    assert_eq!(sample.bank.updated_at_nanos, 0);

    state.set_targets_from_telemetry(&sample);
    assert_eq!(state.target_pitch, LEVEL_FLIGHT);
    assert_eq!(state.target_bank, LEVEL_FLIGHT);
}

#[test]
fn test_stale_raw_value_is_ignored() {
    let register = TelemetryRegister::new(crate::MonotonicClock::new());
    register.record(Axis::Bank, 65535, 0);

    let mut state = AngularState::level();
    state.set_targets_from_telemetry(&register.snapshot());
    assert_eq!(state.target_bank, PI);
}

#[test]
fn test_startup_and_teardown_order() {
    let log = Log::default();
    let ctx = SchedulerContext::new(AdiConfig::default());

    let scheduler = FrameScheduler::initialize(ctx, start_link(&log), || {
        push(&log, "renderer up");
        Ok(pipeline(&log))
    })
    .unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Running);

    assert_eq!(scheduler.shutdown(), ExitStatus::Clean);
    assert_eq!(
        entries(&log),
        vec![
            "telemetry up",
            "renderer up",
            "upload 1199",
            "release mesh 7",
            "renderer down",
            "telemetry down",
        ]
    );
}

#[test]
fn test_renderer_failure_skips_running() {
    let log = Log::default();
    let ctx = SchedulerContext::new(AdiConfig::default());

    let result = FrameScheduler::<RecordingPipeline>::initialize(ctx, start_link(&log), || {
        anyhow::bail!("no display")
    });
    match result {
        Err(AdiError::Init { stage, reason }) => {
            assert_eq!(stage, "renderer");
            assert!(reason.contains("no display"));
        }
        _ => panic!("expected init failure"),
    }
    assert_eq!(entries(&log), vec!["telemetry up", "telemetry down"]);
}

#[test]
fn test_telemetry_failure_is_fatal() {
    let ctx = SchedulerContext::new(AdiConfig::default());
    let mut renderer_started = false;

    let status = run_blocking(
        ctx,
        |_| anyhow::bail!("broker unreachable"),
        || {
            renderer_started = true;
            Ok(RecordingPipeline::default())
        },
        Some(10),
    );
    assert_eq!(status, ExitStatus::InitFailed);
    assert_eq!(status.code(), 1);
    assert!(!renderer_started);
}

#[test]
fn test_mesh_upload_failure_releases_everything() {
    let log = Log::default();
    let ctx = SchedulerContext::new(AdiConfig::default());

    let status = run_blocking(
        ctx,
        start_link(&log),
        || {
            Ok(RecordingPipeline {
                fail_upload: true,
                ..pipeline(&log)
            })
        },
        None,
    );
    assert_eq!(status, ExitStatus::InitFailed);
    assert_eq!(entries(&log), vec!["telemetry up", "renderer down", "telemetry down"]);
}

#[test]
fn test_invalid_config_fails_before_anything_starts() {
    let mut config = AdiConfig::default();
    config.easing.factor = 0.0;
    let ctx = SchedulerContext::new(config);

    let result = FrameScheduler::<RecordingPipeline>::initialize(
        ctx,
        |_| panic!("telemetry must not start"),
        || panic!("renderer must not start"),
    );
    assert!(matches!(result, Err(AdiError::InvalidConfig(_))));
}

#[test]
fn test_teardown_errors_are_swallowed() {
    let log = Log::default();
    let ctx = SchedulerContext::new(AdiConfig::default());

    let scheduler = FrameScheduler::initialize(ctx, start_link(&log), || {
        Ok(RecordingPipeline {
            fail_shutdown: true,
            ..pipeline(&log)
        })
    })
    .unwrap();

    assert_eq!(scheduler.shutdown(), ExitStatus::Clean);
    assert_eq!(entries(&log).last().map(String::as_str), Some("telemetry down"));
}

#[test]
fn test_shutdown_observed_at_top_of_frame() {
    let ctx = SchedulerContext::new(AdiConfig::default());
    let signal = ctx.shutdown.clone();
    let log = Log::default();

    let mut scheduler = FrameScheduler::initialize(ctx, start_link(&log), || {
        Ok(RecordingPipeline {
            stop_during_draw: Some(signal.clone()),
            ..pipeline(&log)
        })
    })
    .unwrap();

    // the request lands mid-frame; that frame still completes
    assert_eq!(scheduler.step(), FrameOutcome::Presented);
    assert_eq!(scheduler.renderer().draws, 1);

    assert_eq!(scheduler.step(), FrameOutcome::Stopped);
    assert_eq!(scheduler.state(), SchedulerState::ShuttingDown);
    assert_eq!(scheduler.renderer().draws, 1);
}

#[test]
fn test_run_stops_after_frame_budget() {
    let ctx = SchedulerContext::new(AdiConfig::default());
    let signal = ctx.shutdown.clone();
    let log = Log::default();

    let scheduler =
        FrameScheduler::initialize(ctx, start_link(&log), || Ok(pipeline(&log))).unwrap();
    assert_eq!(scheduler.run(Some(5)), ExitStatus::Clean);
    assert!(signal.is_requested());
}

#[test]
fn test_draw_failure_keeps_running() {
    let ctx = SchedulerContext::new(AdiConfig::default());
    let log = Log::default();

    let mut scheduler = FrameScheduler::initialize(ctx, start_link(&log), || {
        Ok(RecordingPipeline {
            fail_draw: true,
            ..pipeline(&log)
        })
    })
    .unwrap();

    assert_eq!(scheduler.step(), FrameOutcome::Skipped);
    assert_eq!(scheduler.step(), FrameOutcome::Skipped);
    assert_eq!(scheduler.state(), SchedulerState::Running);
    assert_eq!(scheduler.frame_clock().frames(), 2);
}

#[test]
fn test_telemetry_drives_ball() {
    let ctx = SchedulerContext::new(AdiConfig::default());
    let register = Arc::clone(&ctx.telemetry);
    let log = Log::default();

    let mut scheduler =
        FrameScheduler::initialize(ctx, start_link(&log), || Ok(pipeline(&log))).unwrap();

    // quarter-scale bank is a quarter turn
    register.on_axis_update(Axis::Bank, 16384);
    for _ in 0..60 {
        scheduler.step();
    }

    let attitude = scheduler.attitude();
    assert!((attitude.target_bank - PI * 0.5).abs() < 1e-3);
    assert!(attitude.is_settled());
    assert_eq!(attitude.pitch, LEVEL_FLIGHT);

    let frame = scheduler.renderer().last_frame.unwrap();
    assert_eq!(frame.model, attitude.model_matrix());
    assert_eq!(frame.frame, 60);
    // frame 60 closes the first fps window
    assert!(frame.fps > 0.0);
}
