mod script;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use shadowbox_assets::{ImageDirectory, ProceduralTextures};
use shadowbox_input::KeyBindings;
use shadowbox_kernel::{
    Engine, EngineConfig, FixedSurface, FramePacer, RunSummary, ScriptedPlatform, run_loop,
};
use shadowbox_render::RecordingBackend;
use shadowbox_tools::EngineInspector;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shadowbox-cli", about = "Headless shadowbox tooling")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML engine configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as YAML
    Config,
    /// Build the scene headlessly and print its summary
    Info,
    /// Run a scripted session against the recording backend
    Simulate {
        /// Frames to run before quitting
        #[arg(short, long, default_value = "60")]
        frames: u64,
        /// Simulated wall-clock time per frame, in milliseconds
        #[arg(long, default_value = "16")]
        step_ms: u64,
        /// Inputs as "frame:action,...", e.g. "2:toggle-flashlight,10:toggle-pause"
        #[arg(short, long, default_value = "")]
        script: String,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    frames: u64,
    rendered: u64,
    skipped: u64,
    sim_time: f64,
    frames_presented: u64,
    violations: Vec<String>,
    leaked_resources: usize,
    last_frame: String,
}

impl SimulationReport {
    fn new(summary: RunSummary, backend: &RecordingBackend) -> Self {
        let (targets, meshes, materials) = backend.live_resources();
        Self {
            frames: summary.frames,
            rendered: summary.rendered,
            skipped: summary.skipped,
            sim_time: summary.sim_time,
            frames_presented: backend.frames_presented(),
            violations: backend
                .violations()
                .iter()
                .map(|v| format!("{v:?}"))
                .collect(),
            leaked_resources: targets + meshes + materials,
            last_frame: backend.describe_last_frame(),
        }
    }
}

fn build_engine(config: EngineConfig, backend: &mut RecordingBackend) -> Result<Engine> {
    let extent = config.window.windowed;
    let engine = match config.texture_dir.clone() {
        Some(dir) => Engine::new(config, backend, ImageDirectory::new(dir), extent)?,
        None => Engine::new(config, backend, ProceduralTextures::default(), extent)?,
    };
    Ok(engine)
}

fn simulate(
    config: EngineConfig,
    frames: u64,
    step: Duration,
    script: &str,
) -> Result<SimulationReport> {
    let steps = script::parse(script)?;
    let bindings = KeyBindings::default();
    let surface = FixedSurface::windowed(config.window.windowed)
        .with_fullscreen_modes([config.window.fullscreen]);
    let mut platform = ScriptedPlatform::new(surface, step);
    for step in steps {
        for event in script::events_for(step.action, &bindings)? {
            platform.push(step.frame, event);
        }
    }
    platform = platform.quit_at(frames);

    let mut backend = RecordingBackend::new();
    let engine = build_engine(config, &mut backend)?.with_bindings(bindings);
    // Pacing is meaningless when no real time passes.
    let summary = run_loop(engine, &mut platform, &mut backend, FramePacer::new(0))?;
    tracing::info!(frames = summary.frames, skipped = summary.skipped, "simulation finished");
    Ok(SimulationReport::new(summary, &backend))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Config => print!("{}", config.to_yaml()?),
        Commands::Info => {
            println!("shadowbox-cli v{}", env!("CARGO_PKG_VERSION"));
            let mut backend = RecordingBackend::new();
            let engine = build_engine(config, &mut backend)?;
            println!("{}", EngineInspector::summary(&engine));
            let (targets, meshes, materials) = backend.live_resources();
            println!(
                "resources: depth_targets={targets} meshes={meshes} materials={materials} extent={}",
                engine.extent()
            );
            engine.shutdown(&mut backend);
        }
        Commands::Simulate {
            frames,
            step_ms,
            script,
            json,
        } => {
            let report = simulate(config, frames, Duration::from_millis(step_ms), &script)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "frames={} rendered={} skipped={} sim_time={:.3}s leaked={}",
                    report.frames,
                    report.rendered,
                    report.skipped,
                    report.sim_time,
                    report.leaked_resources
                );
                for violation in &report.violations {
                    println!("violation: {violation}");
                }
                println!("{}", report.last_frame);
            }
        }
    }

    Ok(())
}
