mod keys;
mod surface;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use shadowbox_assets::{ImageDirectory, ProceduralTextures};
use shadowbox_common::Extent;
use shadowbox_input::InputEvent;
use shadowbox_kernel::{Engine, EngineConfig, FrameOutcome, FramePacer};
use shadowbox_render_wgpu::WgpuBackend;
use shadowbox_tools::EngineInspector;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{CursorGrabMode, Window, WindowId};

use crate::surface::WinitSurface;

/// Frames between window title refreshes.
const TITLE_INTERVAL: u64 = 30;

#[derive(Parser)]
#[command(name = "shadowbox-desktop", about = "Shadow-mapped scene viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML engine configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of PNG textures; overrides the configuration
    #[arg(long)]
    textures: Option<PathBuf>,
}

/// Everything that exists only while the window does.
struct Runtime {
    window: Arc<Window>,
    surface: WinitSurface,
    backend: WgpuBackend,
    engine: Option<Engine>,
}

struct App {
    config: EngineConfig,
    pacer: FramePacer,
    runtime: Option<Runtime>,
    pending: Vec<InputEvent>,
    frame_started: Instant,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(config: EngineConfig) -> Self {
        Self {
            pacer: FramePacer::new(config.window.target_fps),
            config,
            runtime: None,
            pending: Vec::new(),
            frame_started: Instant::now(),
            failure: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<Runtime> {
        let window_config = &self.config.window;
        let attrs = Window::default_attributes()
            .with_title(window_config.title.clone())
            .with_inner_size(PhysicalSize::new(
                window_config.windowed.width,
                window_config.windowed.height,
            ));
        let window = Arc::new(event_loop.create_window(attrs).context("create window")?);
        let size = window.inner_size();
        let extent = Extent::new(size.width, size.height);

        let mut backend = WgpuBackend::new(window.clone(), extent, window_config.vsync)?;
        let config = self.config.clone();
        let engine = match config.texture_dir.clone() {
            Some(dir) => Engine::new(config, &mut backend, ImageDirectory::new(dir), extent)?,
            None => Engine::new(config, &mut backend, ProceduralTextures::default(), extent)?,
        };

        if self.config.window.grab_cursor {
            grab_cursor(&window);
        }
        let mut runtime = Runtime {
            surface: WinitSurface::new(window.clone()),
            window,
            backend,
            engine: Some(engine),
        };
        if self.config.window.start_fullscreen {
            if let Some(engine) = runtime.engine.as_mut() {
                engine.switch_surface(&mut runtime.backend, &mut runtime.surface, true);
            }
        }
        Ok(runtime)
    }

    fn run_frame(&mut self, event_loop: &ActiveEventLoop) {
        let Some(runtime) = self.runtime.as_mut() else {
            return;
        };
        let Some(engine) = runtime.engine.as_mut() else {
            return;
        };
        let now = Instant::now();
        let elapsed = now - self.frame_started;
        self.frame_started = now;

        let events = std::mem::take(&mut self.pending);
        match engine.frame(&mut runtime.backend, &mut runtime.surface, events, elapsed) {
            Ok(FrameOutcome::Quit) => self.shutdown(event_loop),
            Ok(_) => {
                if engine.frame_index() % TITLE_INTERVAL == 0 {
                    runtime.window.set_title(&EngineInspector::title(engine));
                }
            }
            Err(e) => {
                self.failure = Some(e.into());
                self.shutdown(event_loop);
            }
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut runtime) = self.runtime.take() {
            if let Some(engine) = runtime.engine.take() {
                tracing::info!("{}", EngineInspector::summary(&engine));
                engine.shutdown(&mut runtime.backend);
            }
        }
        event_loop.exit();
    }
}

fn grab_cursor(window: &Window) {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Confined)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
    if let Err(e) = grabbed {
        tracing::warn!(error = %e, "cursor grab unavailable");
    }
    window.set_cursor_visible(false);
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.runtime.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(runtime) => {
                self.frame_started = Instant::now();
                runtime.window.request_redraw();
                self.runtime = Some(runtime);
            }
            Err(e) => {
                tracing::error!("startup failed: {e:#}");
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.pending.push(InputEvent::Quit),
            WindowEvent::Resized(size) => self
                .pending
                .push(InputEvent::Resized(Extent::new(size.width, size.height))),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat,
                        ..
                    },
                ..
            } => {
                let Some(key) = keys::translate_key(code) else {
                    return;
                };
                match state {
                    ElementState::Pressed if !repeat => self.pending.push(InputEvent::KeyDown(key)),
                    ElementState::Pressed => {}
                    ElementState::Released => self.pending.push(InputEvent::KeyUp(key)),
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.pending
                    .push(InputEvent::MouseWheel(keys::wheel_delta(delta)));
            }
            WindowEvent::Focused(false) => {
                if let Some(engine) = self.runtime.as_mut().and_then(|r| r.engine.as_mut()) {
                    engine.release_input();
                }
            }
            WindowEvent::Focused(true) => {
                if let Some(runtime) = &self.runtime {
                    if self.config.window.grab_cursor {
                        grab_cursor(&runtime.window);
                    }
                }
            }
            WindowEvent::RedrawRequested => self.run_frame(event_loop),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.pending.push(InputEvent::MouseMotion {
                dx: delta.0 as f32,
                dy: delta.1 as f32,
            });
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(runtime) = &self.runtime else {
            return;
        };
        match self.pacer.deadline(self.frame_started) {
            Some(deadline) if Instant::now() < deadline => {
                event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
            }
            _ => {
                event_loop.set_control_flow(ControlFlow::Poll);
                runtime.window.request_redraw();
            }
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = cli.textures {
        config.texture_dir = Some(dir);
    }
    tracing::info!("shadowbox-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
