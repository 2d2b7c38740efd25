use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use adi_core::{
    AdiConfig, ExitStatus, InstrumentMesh, SchedulerContext, ShutdownSignal, TelemetryConfig,
    TelemetryLink, TelemetryRegister, TopicAction,
};
use adi_render::HeadlessOptions;
use adi_telemetry::{Sweep, TelemetryPublisher, ZmqTelemetryLink};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adi")]
#[command(about = "Attitude director indicator driven by cockpit telemetry")]
struct Cli {
    /// JSON configuration file; built-in defaults otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Telemetry publisher endpoint, overriding the config file
    #[arg(short, long, global = true)]
    endpoint: Option<String>,

    /// Log filter, e.g. "debug" or "adi_telemetry=trace"
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the instrument in a window (default)
    Run,

    /// Run the render loop offscreen
    Headless {
        /// Stop after this many frames
        #[arg(short, long)]
        frames: Option<u64>,

        /// Save the last frame as a PNG
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Print ball mesh statistics
    MeshInfo,

    /// Publish a synthetic pitch and bank sweep
    Feed {
        /// Address to bind the publisher to
        #[arg(short, long, default_value = "tcp://*:5556")]
        bind: String,

        /// Updates per second
        #[arg(long, default_value_t = 30.0)]
        rate: f64,

        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<f64>,
    },
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(cli: &Cli) -> Result<AdiConfig> {
    let mut config = match &cli.config {
        Some(path) => AdiConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AdiConfig::default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.telemetry.endpoint = endpoint.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        },
    }
}

/// Forward process signals to the frame loop.
fn watch_signals(runtime: &tokio::runtime::Runtime, shutdown: ShutdownSignal) {
    runtime.spawn(async move {
        shutdown_signal().await;
        shutdown.request();
    });
}

fn zmq_telemetry(
    config: TelemetryConfig,
) -> impl FnOnce(Arc<TelemetryRegister>) -> Result<Box<dyn TelemetryLink>> + 'static {
    move |register| {
        let link = ZmqTelemetryLink::connect(&config, register)?;
        Ok(Box::new(link) as Box<dyn TelemetryLink>)
    }
}

fn mesh_info(config: &AdiConfig) {
    let mesh = InstrumentMesh::from_options(&config.ball);
    let ball = &config.ball;

    println!("Ball mesh:");
    println!("  Radius:    {} in", ball.radius);
    println!("  Grid:      {} columns x {} rows", ball.columns, ball.rows);
    println!(
        "  Band:      {}° to {}°",
        ball.band_start_deg,
        ball.band_start_deg + ball.band_span_deg
    );
    println!("  Vertices:  {}", mesh.num_verts());
    println!("  Indices:   {} (u16 triangle strip)", mesh.num_indexes());
    println!("\nBuffer layout:");
    println!("  Positions: {:>6} bytes @ {}", mesh.normals_offset() - mesh.positions_offset(), mesh.positions_offset());
    println!("  Normals:   {:>6} bytes @ {}", mesh.tex_coords_offset() - mesh.normals_offset(), mesh.normals_offset());
    println!("  TexCoords: {:>6} bytes @ {}", mesh.indexes_offset() - mesh.tex_coords_offset(), mesh.tex_coords_offset());
    println!("  Indices:   {:>6} bytes @ {}", mesh.index_bytes().len(), mesh.indexes_offset());
    println!("  Total:     {:>6} bytes", mesh.as_bytes().len());
}

async fn feed(telemetry: &TelemetryConfig, bind: &str, rate: f64, seconds: Option<f64>) -> Result<()> {
    if !(rate > 0.0 && rate.is_finite()) {
        anyhow::bail!("Feed rate must be positive, got {}", rate);
    }
    let pitch = telemetry
        .topic_for(TopicAction::Pitch)
        .context("No pitch topic configured")?;
    let bank = telemetry
        .topic_for(TopicAction::Bank)
        .context("No bank topic configured")?;

    let publisher = TelemetryPublisher::bind(bind)?;
    let sweep = Sweep::default();
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / rate));
    let start = Instant::now();
    let mut sent: u64 = 0;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let t = start.elapsed().as_secs_f64();
                if seconds.is_some_and(|limit| t >= limit) {
                    break;
                }
                publisher.publish(pitch, sweep.pitch(t))?;
                publisher.publish(bank, sweep.bank(t))?;
                sent += 1;
            }
        }
    }

    if let Some(goodbye) = telemetry.topic_for(TopicAction::SessionReset) {
        publisher.goodbye(goodbye)?;
    }
    tracing::info!("Feed stopped after {} updates", sent);
    Ok(())
}

fn run(cli: Cli) -> Result<ExitStatus> {
    let config = load_config(&cli)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("adi-runtime")
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let telemetry = zmq_telemetry(config.telemetry.clone());
            let ctx = SchedulerContext::new(config);
            watch_signals(&runtime, ctx.shutdown.clone());
            adi_render::run(ctx, telemetry)
        }

        Commands::Headless { frames, snapshot } => {
            let telemetry = zmq_telemetry(config.telemetry.clone());
            let ctx = SchedulerContext::new(config);
            watch_signals(&runtime, ctx.shutdown.clone());
            let options = HeadlessOptions {
                max_frames: frames,
                snapshot,
            };
            Ok(adi_render::run_headless(ctx, telemetry, options))
        }

        Commands::MeshInfo => {
            mesh_info(&config);
            Ok(ExitStatus::Clean)
        }

        Commands::Feed {
            bind,
            rate,
            seconds,
        } => {
            runtime.block_on(feed(&config.telemetry, &bind, rate, seconds))?;
            Ok(ExitStatus::Clean)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    match run(cli) {
        Ok(status) => ExitCode::from(status.code()),
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
