//! Per-frame pass sequencing: two depth-only shadow passes, then the main pass.

use glam::{Mat4, Vec3};

use crate::backend::{
    DrawItem, DrawSink, GpuLight, MainPassParams, RenderBackend, RenderError, Renderable,
};
use crate::shadow::{LightPose, ShadowBias, ShadowProjection, ShadowSlot, ShadowTarget};

/// Whether and from where a shadow-casting light renders this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowRequest {
    pub enabled: bool,
    pub strength: f32,
    pub pose: LightPose,
}

impl ShadowRequest {
    /// A light that is off or dark has nothing to occlude; its pass is skipped.
    pub fn should_render(&self) -> bool {
        self.enabled && self.strength > 0.0
    }
}

/// Camera and lighting state for one frame, already updated.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    pub view_proj: Mat4,
    pub camera_position: Vec3,
    pub ambient: f32,
    pub lights: &'a [GpuLight],
    /// Indexed by [`ShadowSlot::index`].
    pub shadows: [ShadowRequest; 2],
    /// Extra main-pass draws (light markers); never cast shadows.
    pub markers: &'a [DrawItem],
}

/// What the pipeline executed in a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub shadow_passes: [bool; 2],
    pub shadow_draws: [usize; 2],
    pub main_draws: usize,
}

impl PassReport {
    pub fn ran(&self, slot: ShadowSlot) -> bool {
        self.shadow_passes[slot.index()]
    }

    /// Render passes executed, main pass included.
    pub fn pass_count(&self) -> usize {
        1 + self.shadow_passes.iter().filter(|ran| **ran).count()
    }
}

/// Forwards draws and counts them.
struct Counting<'a, S: ?Sized> {
    inner: &'a mut S,
    count: usize,
}

impl<'a, S: DrawSink + ?Sized> Counting<'a, S> {
    fn new(inner: &'a mut S) -> Self {
        Self { inner, count: 0 }
    }
}

impl<S: DrawSink + ?Sized> DrawSink for Counting<'_, S> {
    fn draw(&mut self, item: &DrawItem) {
        self.count += 1;
        self.inner.draw(item);
    }
}

/// Owns both shadow targets and runs the three render passes of a frame in order.
#[derive(Debug)]
pub struct FramePipeline {
    targets: [ShadowTarget; 2],
    clear_color: Vec3,
    bias: ShadowBias,
}

impl FramePipeline {
    /// Allocate one depth target per shadow-casting light.
    pub fn allocate<B: RenderBackend + ?Sized>(
        backend: &mut B,
        resolution: u32,
        global: ShadowProjection,
        flashlight: ShadowProjection,
        clear_color: Vec3,
        bias: ShadowBias,
    ) -> Result<Self, RenderError> {
        let global = ShadowTarget::allocate(backend, ShadowSlot::Global, resolution, global)?;
        let flashlight =
            match ShadowTarget::allocate(backend, ShadowSlot::Flashlight, resolution, flashlight) {
                Ok(target) => target,
                Err(e) => {
                    global.release(backend);
                    return Err(e);
                }
            };
        Ok(Self {
            targets: [global, flashlight],
            clear_color,
            bias,
        })
    }

    pub fn target(&self, slot: ShadowSlot) -> &ShadowTarget {
        &self.targets[slot.index()]
    }

    pub fn bias(&self) -> ShadowBias {
        self.bias
    }

    /// Record one frame: clear both depth targets, run each enabled shadow
    /// pass, then the main pass. Presenting is left to the caller.
    pub fn render<B, R>(
        &mut self,
        backend: &mut B,
        objects: &[R],
        frame: &FrameInputs<'_>,
    ) -> Result<PassReport, RenderError>
    where
        B: RenderBackend + ?Sized,
        R: Renderable,
    {
        backend.begin_frame()?;
        let _span = tracing::trace_span!("frame_pipeline").entered();

        for target in &self.targets {
            target.clear(backend);
        }

        let mut report = PassReport::default();
        for slot in ShadowSlot::ALL {
            let request = frame.shadows[slot.index()];
            if !request.should_render() {
                continue;
            }
            let target = &mut self.targets[slot.index()];
            target.update_light_space(request.pose);
            target.begin_pass(backend);
            let mut sink = Counting::new(backend);
            for object in objects {
                object.render_shadow(slot, &mut sink);
            }
            report.shadow_draws[slot.index()] = sink.count;
            backend.end_pass();
            report.shadow_passes[slot.index()] = true;
        }

        let params = self.main_params(frame, &report);
        backend.begin_main_pass(&params);
        let mut sink = Counting::new(backend);
        for object in objects {
            object.render_main(&mut sink);
        }
        for marker in frame.markers {
            sink.draw(marker);
        }
        report.main_draws = sink.count;
        backend.end_pass();

        tracing::trace!(
            global = report.ran(ShadowSlot::Global),
            flashlight = report.ran(ShadowSlot::Flashlight),
            draws = report.main_draws,
            "frame recorded"
        );
        Ok(report)
    }

    fn main_params(&self, frame: &FrameInputs<'_>, report: &PassReport) -> MainPassParams {
        let lights = frame
            .lights
            .iter()
            .map(|light| {
                let mut light = *light;
                if let Some(slot) = light.shadow {
                    if !frame.shadows[slot.index()].enabled {
                        light.strength = 0.0;
                    }
                }
                light
            })
            .collect();
        MainPassParams {
            view_proj: frame.view_proj,
            camera_position: frame.camera_position,
            clear_color: self.clear_color,
            ambient: frame.ambient,
            lights,
            shadows: ShadowSlot::ALL.map(|slot| self.target(slot).binding(report.ran(slot))),
            bias: self.bias,
        }
    }

    /// Destroy both depth targets, in reverse allocation order.
    pub fn release<B: RenderBackend + ?Sized>(self, backend: &mut B) {
        let [global, flashlight] = self.targets;
        flashlight.release(backend);
        global.release(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LightKind;
    use crate::mesh::cube_mesh;
    use crate::recording::{Command, RecordingBackend, Violation};
    use shadowbox_common::TextureImage;

    struct Box1(DrawItem);

    impl Renderable for Box1 {
        fn update(&mut self, _dt: f32) {}

        fn render_main<S: DrawSink + ?Sized>(&self, sink: &mut S) {
            sink.draw(&self.0);
        }

        fn render_shadow<S: DrawSink + ?Sized>(&self, _slot: ShadowSlot, sink: &mut S) {
            sink.draw(&self.0);
        }
    }

    fn ortho() -> ShadowProjection {
        ShadowProjection::Orthographic {
            center: Vec3::ZERO,
            half_extent: 24.0,
            distance: 30.0,
            near: 0.1,
            far: 80.0,
        }
    }

    fn spot() -> ShadowProjection {
        ShadowProjection::Perspective {
            fov_y: 0.8,
            near: 0.1,
            far: 50.0,
        }
    }

    struct Fixture {
        backend: RecordingBackend,
        pipeline: FramePipeline,
        objects: Vec<Box1>,
        lights: Vec<GpuLight>,
    }

    fn fixture() -> Fixture {
        let mut backend = RecordingBackend::new();
        let pipeline =
            FramePipeline::allocate(&mut backend, 256, ortho(), spot(), Vec3::ZERO, ShadowBias::default())
                .unwrap();
        let mesh = backend.upload_mesh(&cube_mesh()).unwrap();
        let material = backend
            .create_material(&TextureImage::solid([255, 255, 255, 255]))
            .unwrap();
        let objects = (0..3)
            .map(|i| {
                Box1(DrawItem {
                    mesh,
                    material,
                    model: Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0)),
                    albedo: Vec3::ONE,
                    emissive: false,
                })
            })
            .collect();
        let lights = vec![
            GpuLight {
                kind: LightKind::Directional,
                position: Vec3::new(-5.0, 2.0, 5.0),
                direction: Vec3::new(5.0, -2.0, -5.0).normalize(),
                color: Vec3::new(1.0, 1.0, 0.0),
                strength: 1.0,
                shadow: Some(ShadowSlot::Global),
            },
            GpuLight {
                kind: LightKind::Spot {
                    inner_cos: 0.97,
                    outer_cos: 0.95,
                },
                position: Vec3::new(0.0, 0.0, 5.0),
                direction: -Vec3::Z,
                color: Vec3::ONE,
                strength: 1.0,
                shadow: Some(ShadowSlot::Flashlight),
            },
        ];
        Fixture {
            backend,
            pipeline,
            objects,
            lights,
        }
    }

    fn requests(global: bool, flashlight: bool) -> [ShadowRequest; 2] {
        [
            ShadowRequest {
                enabled: global,
                strength: if global { 1.0 } else { 0.0 },
                pose: LightPose::looking_at(Vec3::new(-5.0, 2.0, 5.0), Vec3::ZERO),
            },
            ShadowRequest {
                enabled: flashlight,
                strength: if flashlight { 1.0 } else { 0.0 },
                pose: LightPose {
                    position: Vec3::new(0.0, 0.0, 5.0),
                    direction: -Vec3::Z,
                },
            },
        ]
    }

    fn run(f: &mut Fixture, shadows: [ShadowRequest; 2]) -> PassReport {
        let frame = FrameInputs {
            view_proj: Mat4::IDENTITY,
            camera_position: Vec3::new(0.0, 0.0, 5.0),
            ambient: 0.1,
            lights: &f.lights,
            shadows,
            markers: &[],
        };
        let report = f.pipeline.render(&mut f.backend, &f.objects, &frame).unwrap();
        f.backend.present().unwrap();
        report
    }

    fn pass_sequence(backend: &RecordingBackend) -> Vec<String> {
        backend
            .commands()
            .iter()
            .filter(|c| !matches!(c, Command::Draw(_)))
            .map(|c| c.label())
            .collect()
    }

    #[test]
    fn passes_run_in_order_when_both_lights_enabled() {
        let mut f = fixture();
        let report = run(&mut f, requests(true, true));
        assert_eq!(report.pass_count(), 3);
        assert_eq!(report.shadow_draws, [3, 3]);
        assert_eq!(report.main_draws, 3);

        let a = f.pipeline.target(ShadowSlot::Global).depth_target();
        let b = f.pipeline.target(ShadowSlot::Flashlight).depth_target();
        assert_eq!(
            pass_sequence(&f.backend),
            vec![
                "begin-frame".to_string(),
                format!("clear {a:?}"),
                format!("clear {b:?}"),
                format!("shadow {a:?}"),
                "end".to_string(),
                format!("shadow {b:?}"),
                "end".to_string(),
                "main".to_string(),
                "end".to_string(),
                "present".to_string(),
            ]
        );
        assert!(f.backend.violations().is_empty());
    }

    #[test]
    fn disabled_light_skips_its_pass_and_is_not_sampled() {
        let mut f = fixture();
        let report = run(&mut f, requests(false, true));
        assert!(!report.ran(ShadowSlot::Global));
        assert!(report.ran(ShadowSlot::Flashlight));

        let main = f.backend.last_main_pass().unwrap();
        assert!(!main.shadow(ShadowSlot::Global).sampled);
        assert!(main.shadow(ShadowSlot::Flashlight).sampled);
        assert!(f.backend.violations().is_empty());
    }

    #[test]
    fn both_targets_cleared_even_with_every_pass_skipped() {
        let mut f = fixture();
        let report = run(&mut f, requests(false, false));
        assert_eq!(report.pass_count(), 1);
        let clears = f
            .backend
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::ClearDepth(_)))
            .count();
        assert_eq!(clears, 2);
        assert!(f.backend.violations().is_empty());
    }

    #[test]
    fn zero_strength_skips_pass_even_when_enabled() {
        let mut f = fixture();
        let mut shadows = requests(true, true);
        shadows[0].strength = 0.0;
        let report = run(&mut f, shadows);
        assert!(!report.ran(ShadowSlot::Global));
        assert!(f.backend.violations().is_empty());
    }

    #[test]
    fn disabled_light_contributes_zero_in_main_pass() {
        let mut f = fixture();
        run(&mut f, requests(true, false));
        let main = f.backend.last_main_pass().unwrap();
        let flash = main
            .lights
            .iter()
            .find(|l| l.shadow == Some(ShadowSlot::Flashlight))
            .unwrap();
        assert_eq!(flash.strength, 0.0);
    }

    #[test]
    fn toggling_lights_across_frames_never_reads_stale_depth() {
        let mut f = fixture();
        for (g, fl) in [(true, true), (false, true), (true, false), (false, false), (true, true)] {
            run(&mut f, requests(g, fl));
        }
        assert!(f.backend.violations().is_empty(), "{:?}", f.backend.violations());
        assert_eq!(f.backend.frames_presented(), 5);
    }

    #[test]
    fn markers_draw_only_in_main_pass() {
        let mut f = fixture();
        let marker = DrawItem {
            emissive: true,
            ..f.objects[0].0
        };
        let frame = FrameInputs {
            view_proj: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            ambient: 0.1,
            lights: &f.lights,
            shadows: requests(true, true),
            markers: &[marker],
        };
        let report = f.pipeline.render(&mut f.backend, &f.objects, &frame).unwrap();
        assert_eq!(report.shadow_draws, [3, 3]);
        assert_eq!(report.main_draws, 4);
    }

    #[test]
    fn failed_frame_acquisition_records_nothing() {
        let mut f = fixture();
        f.backend.fail_next_frame(RenderError::SurfaceLost);
        let frame = FrameInputs {
            view_proj: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            ambient: 0.1,
            lights: &f.lights,
            shadows: requests(true, true),
            markers: &[],
        };
        let err = f.pipeline.render(&mut f.backend, &f.objects, &frame).unwrap_err();
        assert!(err.is_recoverable());
        assert!(f.backend.commands().is_empty());
    }

    #[test]
    fn release_destroys_targets_in_reverse_order() {
        let mut f = fixture();
        let a = f.pipeline.target(ShadowSlot::Global).depth_target();
        let b = f.pipeline.target(ShadowSlot::Flashlight).depth_target();
        f.pipeline.release(&mut f.backend);
        assert!(!f.backend.is_live_depth_target(a));
        assert!(!f.backend.is_live_depth_target(b));
        let destroyed: Vec<_> = f
            .backend
            .resource_log()
            .iter()
            .filter_map(|e| match e {
                crate::recording::ResourceEvent::DestroyedDepthTarget(id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(destroyed, vec![b, a]);
    }

    #[test]
    fn stale_read_is_flagged_by_the_instrumented_backend() {
        // Bypass the pipeline and sample a target that was only cleared.
        let mut f = fixture();
        let target = f.pipeline.target(ShadowSlot::Global);
        f.backend.begin_frame().unwrap();
        target.clear(&mut f.backend);
        let mut params = f.pipeline.main_params(
            &FrameInputs {
                view_proj: Mat4::IDENTITY,
                camera_position: Vec3::ZERO,
                ambient: 0.1,
                lights: &f.lights,
                shadows: requests(true, false),
                markers: &[],
            },
            &PassReport::default(),
        );
        params.shadows[0].sampled = true;
        f.backend.begin_main_pass(&params);
        assert!(matches!(
            f.backend.violations(),
            [Violation::StaleShadowRead { .. }]
        ));
    }
}
