//! The frame scheduler: one [`Engine::frame`] per loop iteration.

use std::time::Duration;

use shadowbox_assets::{TextureCache, TextureProvider};
use shadowbox_common::Extent;
use shadowbox_input::{InputEvent, KeyBindings, MovementState};
use shadowbox_render::{
    FrameInputs, FramePipeline, PassReport, RenderBackend, RenderError, ambient_factor,
};
use shadowbox_scene::{FlyCamera, LightRig, Scene, SceneError};

use crate::clock::{FpsCounter, FrameTime, SimClock};
use crate::config::{ConfigError, EngineConfig};
use crate::platform::{Surface, SurfaceError, SurfaceMode};
use crate::state::{Effect, EngineState, LightPresets};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("initialization failed: {0}")]
    Init(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// What happened in one call to [`Engine::frame`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Rendered(PassReport),
    /// The backend could not produce this frame; the loop carries on.
    Skipped,
    /// A quit was requested. Call [`Engine::shutdown`] next.
    Quit,
}

/// Owns the camera, scene, shadow pipeline and toggle state.
///
/// The render backend and the surface are borrowed per call; the engine's
/// GPU resources live in the backend and are freed by [`Engine::shutdown`].
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    presets: LightPresets,
    state: EngineState,
    bindings: KeyBindings,
    movement: MovementState,
    camera: FlyCamera,
    scene: Scene,
    pipeline: FramePipeline,
    clock: SimClock,
    fps: FpsCounter,
    extent: Extent,
    last_time: Option<FrameTime>,
    last_report: Option<PassReport>,
    skipped: u64,
}

impl Engine {
    /// Build the scene and allocate both shadow targets.
    pub fn new<B, P>(
        config: EngineConfig,
        backend: &mut B,
        textures: P,
        extent: Extent,
    ) -> Result<Self, EngineError>
    where
        B: RenderBackend + ?Sized,
        P: TextureProvider,
    {
        config.validate()?;
        let _span = tracing::info_span!("engine_init").entered();

        let mut cache = TextureCache::new(textures);
        let lights = LightRig::from_config(&config.lighting);
        let scene = Scene::build(backend, &mut cache, &config.scene, lights)?;

        let shadows = &config.shadows;
        let pipeline = match FramePipeline::allocate(
            backend,
            shadows.resolution,
            shadows.global,
            shadows.flashlight,
            config.clear_color,
            shadows.bias,
        ) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                scene.release(backend);
                return Err(e.into());
            }
        };

        let extent = extent.non_zero();
        backend.resize(extent);
        let camera = FlyCamera::new(&config.camera, extent);

        tracing::info!(
            objects = scene.objects().len(),
            shadow_resolution = shadows.resolution,
            %extent,
            "engine ready"
        );
        Ok(Self {
            presets: LightPresets::from_config(&config),
            state: EngineState::from_config(&config),
            bindings: KeyBindings::default(),
            movement: MovementState::new(),
            camera,
            scene,
            pipeline,
            clock: SimClock::new(),
            fps: FpsCounter::new(),
            extent,
            last_time: None,
            last_report: None,
            skipped: 0,
            config,
        })
    }

    pub fn with_bindings(mut self, bindings: KeyBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn camera(&self) -> &FlyCamera {
        &self.camera
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn sim_time(&self) -> f64 {
        self.clock.sim_time()
    }

    pub fn frame_index(&self) -> u64 {
        self.clock.frame_index()
    }

    pub fn fps(&self) -> f32 {
        self.fps.fps()
    }

    pub fn last_time(&self) -> Option<FrameTime> {
        self.last_time
    }

    pub fn last_report(&self) -> Option<PassReport> {
        self.last_report
    }

    pub fn skipped_frames(&self) -> u64 {
        self.skipped
    }

    /// Forget held keys, e.g. when the window loses focus.
    pub fn release_input(&mut self) {
        self.movement.release_all();
    }

    /// Run one loop iteration: time, input, update, the three passes, present.
    pub fn frame<B, S, I>(
        &mut self,
        backend: &mut B,
        surface: &mut S,
        events: I,
        elapsed: Duration,
    ) -> Result<FrameOutcome, EngineError>
    where
        B: RenderBackend + ?Sized,
        S: Surface + ?Sized,
        I: IntoIterator<Item = InputEvent>,
    {
        let time = self.clock.advance(elapsed, self.state.paused);
        self.last_time = Some(time);
        self.fps.record(elapsed);

        for event in events {
            if self.handle_event(backend, surface, event) {
                tracing::info!(frame = time.frame_index, "quit requested");
                return Ok(FrameOutcome::Quit);
            }
        }

        self.camera.update(time.sim_dt, &mut self.movement);
        self.scene.lights_mut().update(time.sim_dt);
        self.scene.update_objects(time.sim_dt);

        match self.render(backend) {
            Ok(report) => {
                self.last_report = Some(report);
                Ok(FrameOutcome::Rendered(report))
            }
            Err(e) if e.is_recoverable() => {
                self.skipped += 1;
                tracing::warn!(error = %e, frame = time.frame_index, "frame skipped");
                Ok(FrameOutcome::Skipped)
            }
            Err(e) => {
                tracing::error!(error = %e, "render failure");
                Err(e.into())
            }
        }
    }

    fn render<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> Result<PassReport, RenderError> {
        let lights = self.scene.lights();
        let gpu_lights = lights.gpu_lights(&self.camera);
        let shadows =
            lights.shadow_requests(&self.camera, self.state.global_light, self.state.flashlight);
        let markers = if self.state.debug_lights {
            self.scene.light_markers()
        } else {
            Vec::new()
        };
        let inputs = FrameInputs {
            view_proj: self.camera.view_projection(),
            camera_position: self.camera.position(),
            ambient: ambient_factor(self.config.lighting.base_ambient, self.state.global_ambient),
            lights: &gpu_lights,
            shadows,
            markers: &markers,
        };
        let report = self.pipeline.render(backend, self.scene.objects(), &inputs)?;
        backend.present()?;
        Ok(report)
    }

    /// Returns true when the event requests quit.
    fn handle_event<B, S>(&mut self, backend: &mut B, surface: &mut S, event: InputEvent) -> bool
    where
        B: RenderBackend + ?Sized,
        S: Surface + ?Sized,
    {
        self.movement.observe(&event);
        if let InputEvent::Resized(extent) = event {
            self.apply_extent(backend, extent);
        }
        let Some(action) = self.bindings.translate(&event) else {
            return false;
        };
        match self.state.apply(action, &self.presets) {
            Effect::None => {}
            Effect::Quit => return true,
            Effect::SetWireframe(on) => {
                let actual = backend.set_wireframe(on);
                if actual != on {
                    tracing::warn!("wireframe rendering unsupported by this backend");
                    self.state.wireframe = actual;
                }
            }
            Effect::SetFullscreen(on) => self.switch_surface(backend, surface, on),
            Effect::FlashlightStrength(s) => self.scene.lights_mut().flashlight.set_strength(s),
            Effect::GlobalLightStrength(s) => self.scene.lights_mut().global.set_strength(s),
            Effect::AmbientChanged(v) => tracing::info!("ambient {v:.1}"),
        }
        false
    }

    /// Move to full-screen or back to the windowed size. A mode the display
    /// cannot provide leaves the previous surface and flag untouched.
    pub fn switch_surface<B, S>(&mut self, backend: &mut B, surface: &mut S, fullscreen: bool)
    where
        B: RenderBackend + ?Sized,
        S: Surface + ?Sized,
    {
        let window = &self.config.window;
        let mode = if fullscreen {
            SurfaceMode::Fullscreen(window.fullscreen)
        } else {
            SurfaceMode::Windowed(window.windowed)
        };
        match surface.set_mode(mode) {
            Ok(extent) => {
                tracing::debug!(%mode, %extent, "surface mode changed");
                self.state.fullscreen = mode.is_fullscreen();
                self.apply_extent(backend, extent);
            }
            Err(e) => {
                tracing::warn!(error = %e, "keeping previous surface mode");
                self.state.fullscreen = surface.mode().is_fullscreen();
            }
        }
    }

    fn apply_extent<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, extent: Extent) {
        let extent = extent.non_zero();
        self.extent = extent;
        self.camera.set_aspect_and_projection(extent.width, extent.height);
        backend.resize(extent);
    }

    /// Release GPU resources in reverse acquisition order: shadow targets,
    /// then scene materials and meshes.
    pub fn shutdown<B: RenderBackend + ?Sized>(self, backend: &mut B) {
        tracing::info!(
            frames = self.clock.frame_index(),
            skipped = self.skipped,
            "shutting down"
        );
        self.pipeline.release(backend);
        self.scene.release(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::FixedSurface;
    use shadowbox_assets::ProceduralTextures;
    use shadowbox_input::Key;
    use shadowbox_render::{RecordingBackend, ShadowSlot, Violation};

    const STEP: Duration = Duration::from_millis(16);

    fn small_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.scene.floor.tiles_per_side = 4;
        config.shadows.resolution = 64;
        config
    }

    fn setup() -> (Engine, RecordingBackend, FixedSurface) {
        let config = small_config();
        let mut backend = RecordingBackend::new();
        let surface = FixedSurface::windowed(config.window.windowed)
            .with_fullscreen_modes([config.window.fullscreen]);
        let engine = Engine::new(
            config.clone(),
            &mut backend,
            ProceduralTextures::with_size(4),
            config.window.windowed,
        )
        .unwrap();
        (engine, backend, surface)
    }

    fn press(key: Key) -> Vec<InputEvent> {
        vec![InputEvent::KeyDown(key), InputEvent::KeyUp(key)]
    }

    fn step(
        engine: &mut Engine,
        backend: &mut RecordingBackend,
        surface: &mut FixedSurface,
        events: Vec<InputEvent>,
    ) -> FrameOutcome {
        engine.frame(backend, surface, events, STEP).unwrap()
    }

    #[test]
    fn default_frame_runs_global_pass_and_main() {
        let (mut engine, mut backend, mut surface) = setup();
        let outcome = step(&mut engine, &mut backend, &mut surface, vec![]);
        let FrameOutcome::Rendered(report) = outcome else {
            panic!("expected a rendered frame, got {outcome:?}");
        };
        assert!(report.ran(ShadowSlot::Global));
        assert!(!report.ran(ShadowSlot::Flashlight));
        assert_eq!(report.main_draws, 16 + 5);
        assert_eq!(backend.frames_presented(), 1);
        assert!(backend.violations().is_empty());
    }

    #[test]
    fn pause_freezes_simulation_but_not_frames() {
        let (mut engine, mut backend, mut surface) = setup();
        step(&mut engine, &mut backend, &mut surface, vec![]);
        step(&mut engine, &mut backend, &mut surface, press(Key::F(1)));
        let frozen = engine.sim_time();
        let light = engine.scene().lights().global.position;
        for _ in 0..10 {
            step(&mut engine, &mut backend, &mut surface, vec![]);
            assert_eq!(engine.sim_time(), frozen);
            assert_eq!(engine.last_time().unwrap().sim_dt, 0.0);
        }
        assert_eq!(engine.scene().lights().global.position, light);
        assert_eq!(backend.frames_presented(), 12);

        step(&mut engine, &mut backend, &mut surface, press(Key::F(1)));
        step(&mut engine, &mut backend, &mut surface, vec![]);
        assert!(engine.sim_time() > frozen);
    }

    #[test]
    fn global_light_orbits_while_running() {
        let (mut engine, mut backend, mut surface) = setup();
        let start = engine.scene().lights().global.position;
        for _ in 0..5 {
            step(&mut engine, &mut backend, &mut surface, vec![]);
        }
        let moved = engine.scene().lights().global.position;
        assert_ne!(moved, start);
        assert!((moved.y - start.y).abs() < 1e-5);
    }

    #[test]
    fn flashlight_toggle_restores_configured_value() {
        let (mut engine, mut backend, mut surface) = setup();
        let on = engine.config().lighting.flashlight_value;
        step(&mut engine, &mut backend, &mut surface, press(Key::Char('f')));
        assert_eq!(engine.scene().lights().flashlight.strength(), on);
        step(&mut engine, &mut backend, &mut surface, press(Key::Char('f')));
        assert_eq!(engine.scene().lights().flashlight.strength(), 0.0);
        step(&mut engine, &mut backend, &mut surface, press(Key::Char('f')));
        assert_eq!(engine.scene().lights().flashlight.strength(), on);
    }

    #[test]
    fn toggling_lights_never_samples_stale_depth() {
        let (mut engine, mut backend, mut surface) = setup();
        let script = [
            vec![],
            press(Key::Char('f')),
            press(Key::F(2)),
            vec![],
            press(Key::Char('f')),
            press(Key::F(2)),
            press(Key::Char('f')),
        ];
        for events in script {
            let outcome = step(&mut engine, &mut backend, &mut surface, events);
            let FrameOutcome::Rendered(report) = outcome else {
                panic!("unexpected {outcome:?}");
            };
            let main = backend.last_main_pass().unwrap();
            for slot in ShadowSlot::ALL {
                assert_eq!(main.shadow(slot).sampled, report.ran(slot));
            }
        }
        assert!(
            !backend
                .violations()
                .iter()
                .any(|v| matches!(v, Violation::StaleShadowRead { .. })),
            "{:?}",
            backend.violations()
        );
    }

    #[test]
    fn disabled_global_light_skips_its_pass() {
        let (mut engine, mut backend, mut surface) = setup();
        step(&mut engine, &mut backend, &mut surface, press(Key::F(2)));
        let report = engine.last_report().unwrap();
        assert!(!report.ran(ShadowSlot::Global));
        let global = engine.pipeline().target(ShadowSlot::Global).depth_target();
        assert_eq!(backend.shadow_draws(global), 0);
    }

    #[test]
    fn fullscreen_round_trip_restores_windowed_size() {
        let (mut engine, mut backend, mut surface) = setup();
        let aspect = engine.camera().aspect();
        let windowed = engine.extent();

        step(&mut engine, &mut backend, &mut surface, press(Key::F(11)));
        assert!(engine.state().fullscreen);
        assert_eq!(engine.extent(), Extent::new(1920, 1080));
        assert_eq!(backend.extent(), Extent::new(1920, 1080));

        step(&mut engine, &mut backend, &mut surface, press(Key::F(11)));
        assert!(!engine.state().fullscreen);
        assert_eq!(engine.extent(), windowed);
        assert_eq!(backend.extent(), windowed);
        assert!((engine.camera().aspect() - aspect).abs() < 1e-6);
    }

    #[test]
    fn unavailable_fullscreen_falls_back() {
        let (mut engine, mut backend, _) = setup();
        let mut surface = FixedSurface::windowed(Extent::new(1600, 900));
        let outcome = step(&mut engine, &mut backend, &mut surface, press(Key::F(11)));
        assert!(matches!(outcome, FrameOutcome::Rendered(_)));
        assert!(!engine.state().fullscreen);
        assert_eq!(engine.extent(), Extent::new(1600, 900));
    }

    #[test]
    fn os_resize_updates_camera_and_backend() {
        let (mut engine, mut backend, mut surface) = setup();
        let extent = Extent::new(800, 800);
        step(
            &mut engine,
            &mut backend,
            &mut surface,
            vec![InputEvent::Resized(extent)],
        );
        assert_eq!(backend.extent(), extent);
        assert!((engine.camera().aspect() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ambient_wheel_is_bounded() {
        let (mut engine, mut backend, mut surface) = setup();
        let ups = vec![InputEvent::MouseWheel(1.0); 50];
        step(&mut engine, &mut backend, &mut surface, ups);
        assert_eq!(engine.state().global_ambient, 2.0);
        let main = backend.last_main_pass().unwrap();
        assert!((main.ambient - 0.3).abs() < 1e-6);
    }

    #[test]
    fn debug_lights_add_markers_to_main_pass_only() {
        let (mut engine, mut backend, mut surface) = setup();
        step(&mut engine, &mut backend, &mut surface, vec![]);
        let plain = engine.last_report().unwrap();
        step(&mut engine, &mut backend, &mut surface, press(Key::F(4)));
        let with_markers = engine.last_report().unwrap();
        assert_eq!(with_markers.main_draws, plain.main_draws + 3);
        assert_eq!(with_markers.shadow_draws, plain.shadow_draws);
    }

    #[test]
    fn wireframe_applies_to_every_pass() {
        let (mut engine, mut backend, mut surface) = setup();
        let mut events = press(Key::F(3));
        events.extend(press(Key::Char('f')));
        step(&mut engine, &mut backend, &mut surface, events);
        assert!(engine.state().wireframe);
        assert!(backend.wireframe());

        step(&mut engine, &mut backend, &mut surface, vec![]);
        let report = engine.last_report().unwrap();
        assert!(report.ran(ShadowSlot::Global));
        assert!(report.ran(ShadowSlot::Flashlight));
        assert_eq!(backend.pass_line_modes(), &[true, true, true]);

        step(&mut engine, &mut backend, &mut surface, press(Key::F(3)));
        assert!(!backend.wireframe());
        assert!(backend.pass_line_modes().iter().all(|line| !line));
    }

    #[test]
    fn wireframe_reverts_when_unsupported() {
        let config = small_config();
        let mut backend = RecordingBackend::new().without_line_mode();
        let mut surface = FixedSurface::windowed(config.window.windowed);
        let mut engine = Engine::new(
            config.clone(),
            &mut backend,
            ProceduralTextures::with_size(4),
            config.window.windowed,
        )
        .unwrap();
        step(&mut engine, &mut backend, &mut surface, press(Key::F(3)));
        assert!(!engine.state().wireframe);
    }

    #[test]
    fn lost_surface_skips_the_frame() {
        let (mut engine, mut backend, mut surface) = setup();
        backend.fail_next_frame(RenderError::SurfaceLost);
        assert_eq!(
            step(&mut engine, &mut backend, &mut surface, vec![]),
            FrameOutcome::Skipped
        );
        assert_eq!(engine.skipped_frames(), 1);
        assert!(matches!(
            step(&mut engine, &mut backend, &mut surface, vec![]),
            FrameOutcome::Rendered(_)
        ));
    }

    #[test]
    fn fatal_render_error_propagates() {
        let (mut engine, mut backend, mut surface) = setup();
        backend.fail_next_frame(RenderError::Fatal("device lost".into()));
        let err = engine
            .frame(&mut backend, &mut surface, Vec::new(), STEP)
            .unwrap_err();
        assert!(matches!(err, EngineError::Render(RenderError::Fatal(_))));
    }

    #[test]
    fn quit_stops_before_rendering_and_shutdown_frees_everything() {
        let (mut engine, mut backend, mut surface) = setup();
        step(&mut engine, &mut backend, &mut surface, vec![]);
        let outcome = step(
            &mut engine,
            &mut backend,
            &mut surface,
            vec![InputEvent::KeyDown(Key::Escape), InputEvent::KeyDown(Key::F(1))],
        );
        assert_eq!(outcome, FrameOutcome::Quit);
        assert!(!engine.state().paused);
        assert_eq!(backend.frames_presented(), 1);

        engine.shutdown(&mut backend);
        assert_eq!(backend.live_resources(), (0, 0, 0));
        assert!(backend.violations().is_empty());
    }

    #[test]
    fn shutdown_releases_shadow_targets_first() {
        let (engine, mut backend, _) = setup();
        engine.shutdown(&mut backend);
        let first_destroy = backend
            .resource_log()
            .iter()
            .find(|e| {
                !matches!(
                    e,
                    shadowbox_render::ResourceEvent::CreatedDepthTarget(_)
                        | shadowbox_render::ResourceEvent::UploadedMesh(_)
                        | shadowbox_render::ResourceEvent::CreatedMaterial(_)
                )
            })
            .copied();
        assert!(matches!(
            first_destroy,
            Some(shadowbox_render::ResourceEvent::DestroyedDepthTarget(_))
        ));
    }
}
