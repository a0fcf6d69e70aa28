use std::collections::BTreeMap;

use glam::Mat4;
use shadowbox_common::{Extent, TextureImage};
use shadowbox_render::{
    DepthTargetId, DrawItem, DrawSink, MainPassParams, MaterialId, MeshData, MeshId,
    RenderBackend, RenderError, Vertex,
};
use wgpu::util::DeviceExt;

use crate::plan::{Batch, FramePlan, PassKind};
use crate::shaders;
use crate::uniforms::{FrameUniform, InstanceData, ShadowUniform};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const INITIAL_INSTANCES: u32 = 1024;

struct Pipelines {
    shadow: wgpu::RenderPipeline,
    fill: wgpu::RenderPipeline,
    /// Line variants, absent when the adapter lacks line rasterization.
    shadow_line: Option<wgpu::RenderPipeline>,
    line: Option<wgpu::RenderPipeline>,
}

impl Pipelines {
    fn shadow_pipeline(&self, wireframe: bool) -> &wgpu::RenderPipeline {
        match (&self.shadow_line, wireframe) {
            (Some(line), true) => line,
            _ => &self.shadow,
        }
    }

    fn main_pipeline(&self, wireframe: bool) -> &wgpu::RenderPipeline {
        match (&self.line, wireframe) {
            (Some(line), true) => line,
            _ => &self.fill,
        }
    }
}

struct Layouts {
    frame: wgpu::BindGroupLayout,
    material: wgpu::BindGroupLayout,
    shadow: wgpu::BindGroupLayout,
}

struct GpuDepthTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct GpuMesh {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

struct GpuMaterial {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct ActiveFrame {
    output: wgpu::SurfaceTexture,
    plan: FramePlan,
}

/// [`RenderBackend`] on wgpu: depth-only shadow passes into comparison-sampled
/// depth textures, then one forward pass to the window surface.
///
/// Pass calls are recorded during the frame and encoded at [`RenderBackend::present`].
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipelines: Pipelines,
    layouts: Layouts,
    frame_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    max_instances: u32,
    material_sampler: wgpu::Sampler,
    shadow_sampler: wgpu::Sampler,
    depth_view: wgpu::TextureView,
    depth_targets: BTreeMap<DepthTargetId, GpuDepthTarget>,
    meshes: BTreeMap<MeshId, GpuMesh>,
    materials: BTreeMap<MaterialId, GpuMaterial>,
    next_handle: u32,
    wireframe: bool,
    frame: Option<ActiveFrame>,
}

impl WgpuBackend {
    /// Create a device for `target` and configure its surface at `extent`.
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        extent: Extent,
        vsync: bool,
    ) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(target)
            .map_err(|e| RenderError::Init(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| RenderError::Init("no compatible GPU adapter".into()))?;

        let line_mode = adapter
            .features()
            .contains(wgpu::Features::POLYGON_MODE_LINE);
        let required_features = if line_mode {
            wgpu::Features::POLYGON_MODE_LINE
        } else {
            wgpu::Features::empty()
        };
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("shadowbox_device"),
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| RenderError::Init(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(caps.formats.first())
            .copied()
            .ok_or_else(|| RenderError::Init("surface reports no formats".into()))?;
        let extent = extent.non_zero();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: extent.width,
            height: extent.height,
            present_mode: if vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let layouts = Layouts::new(&device);
        let pipelines = Pipelines::new(&device, &layouts, format, line_mode);

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniforms"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let instance_buffer = create_instance_buffer(&device, INITIAL_INSTANCES);

        let material_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let depth_view = create_depth_texture(&device, extent, "main_depth").1;

        tracing::info!(
            backend = adapter.get_info().backend.to_str(),
            adapter = %adapter.get_info().name,
            ?format,
            line_mode,
            "GPU initialized"
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipelines,
            layouts,
            frame_buffer,
            instance_buffer,
            max_instances: INITIAL_INSTANCES,
            material_sampler,
            shadow_sampler,
            depth_view,
            depth_targets: BTreeMap::new(),
            meshes: BTreeMap::new(),
            materials: BTreeMap::new(),
            next_handle: 0,
            wireframe: false,
            frame: None,
        })
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn next_handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn depth_target(&self, id: DepthTargetId) -> Result<&GpuDepthTarget, RenderError> {
        self.depth_targets
            .get(&id)
            .ok_or(RenderError::UnknownResource {
                kind: "depth target",
                id: id.0,
            })
    }

    fn ensure_instance_capacity(&mut self, count: usize) {
        let needed = count as u32;
        if needed <= self.max_instances {
            return;
        }
        let capacity = needed.next_power_of_two();
        tracing::debug!(capacity, "growing instance buffer");
        self.instance_buffer = create_instance_buffer(&self.device, capacity);
        self.max_instances = capacity;
    }

    fn frame_bind_group(&self, params: &MainPassParams) -> Result<wgpu::BindGroup, RenderError> {
        let global = self.depth_target(params.shadows[0].target)?;
        let flashlight = self.depth_target(params.shadows[1].target)?;
        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &self.layouts.frame,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&global.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&flashlight.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.shadow_sampler),
                },
            ],
        }))
    }

    fn draw_batches(&self, pass: &mut wgpu::RenderPass<'_>, batches: &[Batch], textured: bool) {
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        for batch in batches {
            let Some(mesh) = self.meshes.get(&batch.mesh) else {
                continue;
            };
            if textured {
                let Some(material) = self.materials.get(&batch.material) else {
                    continue;
                };
                pass.set_bind_group(1, &material.bind_group, &[]);
            }
            pass.set_vertex_buffer(0, mesh.vertex.slice(..));
            pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..mesh.index_count, 0, batch.instances.clone());
        }
    }

    fn encode(&self, plan: &FramePlan, view: &wgpu::TextureView) -> Result<wgpu::CommandBuffer, RenderError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        for id in plan.standalone_clears() {
            let target = self.depth_target(id)?;
            drop(encoder.begin_render_pass(&depth_only_pass("clear_depth", &target.view, true)));
        }

        for planned in plan.passes() {
            match &planned.kind {
                PassKind::Shadow {
                    target,
                    light_space,
                } => {
                    let target = self.depth_target(*target)?;
                    self.queue.write_buffer(
                        &target.uniform,
                        0,
                        bytemuck::bytes_of(&ShadowUniform::new(*light_space)),
                    );
                    let mut pass = encoder.begin_render_pass(&depth_only_pass(
                        "shadow_pass",
                        &target.view,
                        planned.clear_first,
                    ));
                    pass.set_pipeline(self.pipelines.shadow_pipeline(self.wireframe));
                    pass.set_bind_group(0, &target.bind_group, &[]);
                    self.draw_batches(&mut pass, &planned.batches, false);
                }
                PassKind::Main(params) => {
                    self.queue.write_buffer(
                        &self.frame_buffer,
                        0,
                        bytemuck::bytes_of(&FrameUniform::from_params(params)),
                    );
                    let bind_group = self.frame_bind_group(params)?;
                    let [r, g, b] = params.clear_color.to_array();
                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("main_pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color {
                                    r: r as f64,
                                    g: g as f64,
                                    b: b as f64,
                                    a: 1.0,
                                }),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                            view: &self.depth_view,
                            depth_ops: Some(wgpu::Operations {
                                load: wgpu::LoadOp::Clear(1.0),
                                store: wgpu::StoreOp::Store,
                            }),
                            stencil_ops: None,
                        }),
                        ..Default::default()
                    });
                    pass.set_pipeline(self.pipelines.main_pipeline(self.wireframe));
                    pass.set_bind_group(0, &bind_group, &[]);
                    self.draw_batches(&mut pass, &planned.batches, true);
                }
            }
        }
        Ok(encoder.finish())
    }
}

impl DrawSink for WgpuBackend {
    fn draw(&mut self, item: &DrawItem) {
        if !self.meshes.contains_key(&item.mesh) {
            tracing::warn!(mesh = item.mesh.0, "draw with unknown mesh dropped");
            return;
        }
        let Some(frame) = self.frame.as_mut() else {
            tracing::warn!("draw outside a frame dropped");
            return;
        };
        if !frame.plan.draw(item) {
            tracing::warn!("draw outside a pass dropped");
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn create_depth_target(&mut self, resolution: u32) -> Result<DepthTargetId, RenderError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if resolution == 0 || resolution > max {
            return Err(RenderError::Init(format!(
                "shadow resolution {resolution} outside 1..={max}"
            )));
        }
        let (texture, view) =
            create_depth_texture(&self.device, Extent::new(resolution, resolution), "shadow_map");
        let uniform = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("shadow_uniforms"),
                contents: bytemuck::bytes_of(&ShadowUniform::new(Mat4::IDENTITY)),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow_bind_group"),
            layout: &self.layouts.shadow,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        });
        let id = DepthTargetId(self.next_handle());
        self.depth_targets.insert(
            id,
            GpuDepthTarget {
                _texture: texture,
                view,
                uniform,
                bind_group,
            },
        );
        tracing::debug!(id = id.0, resolution, "created depth target");
        Ok(id)
    }

    fn destroy_depth_target(&mut self, id: DepthTargetId) {
        if self.depth_targets.remove(&id).is_none() {
            tracing::warn!(id = id.0, "destroying unknown depth target");
        }
    }

    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshId, RenderError> {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(RenderError::Init("empty mesh".into()));
        }
        let vertex = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_vertices"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        let id = MeshId(self.next_handle());
        self.meshes.insert(
            id,
            GpuMesh {
                vertex,
                index,
                index_count: mesh.index_count(),
            },
        );
        Ok(id)
    }

    fn destroy_mesh(&mut self, id: MeshId) {
        if self.meshes.remove(&id).is_none() {
            tracing::warn!(id = id.0, "destroying unknown mesh");
        }
    }

    fn create_material(&mut self, texture: &TextureImage) -> Result<MaterialId, RenderError> {
        let gpu_texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some("material_texture"),
                size: wgpu::Extent3d {
                    width: texture.width(),
                    height: texture.height(),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            texture.rgba(),
        );
        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material_bind_group"),
            layout: &self.layouts.material,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.material_sampler),
                },
            ],
        });
        let id = MaterialId(self.next_handle());
        self.materials.insert(
            id,
            GpuMaterial {
                _texture: gpu_texture,
                bind_group,
            },
        );
        Ok(id)
    }

    fn destroy_material(&mut self, id: MaterialId) {
        if self.materials.remove(&id).is_none() {
            tracing::warn!(id = id.0, "destroying unknown material");
        }
    }

    fn set_wireframe(&mut self, enabled: bool) -> bool {
        self.wireframe = enabled && self.pipelines.line.is_some();
        if enabled && !self.wireframe {
            tracing::warn!("line rasterization unsupported; staying in fill mode");
        }
        self.wireframe
    }

    fn resize(&mut self, extent: Extent) {
        let extent = extent.non_zero();
        self.config.width = extent.width;
        self.config.height = extent.height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_texture(&self.device, extent, "main_depth").1;
        tracing::debug!(%extent, "surface resized");
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        if self.frame.take().is_some() {
            tracing::warn!("previous frame was never presented");
        }
        let output = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Err(RenderError::SurfaceLost);
            }
            Err(wgpu::SurfaceError::Timeout) => return Err(RenderError::Timeout),
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(e) => return Err(RenderError::Fatal(e.to_string())),
        };
        self.frame = Some(ActiveFrame {
            output,
            plan: FramePlan::default(),
        });
        Ok(())
    }

    fn clear_depth_target(&mut self, id: DepthTargetId) {
        if let Some(frame) = self.frame.as_mut() {
            frame.plan.clear(id);
        }
    }

    fn begin_shadow_pass(&mut self, id: DepthTargetId, light_space: Mat4) {
        if let Some(frame) = self.frame.as_mut() {
            frame.plan.begin(PassKind::Shadow {
                target: id,
                light_space,
            });
        }
    }

    fn begin_main_pass(&mut self, params: &MainPassParams) {
        if let Some(frame) = self.frame.as_mut() {
            frame.plan.begin(PassKind::Main(Box::new(params.clone())));
        }
    }

    fn end_pass(&mut self) {
        if let Some(frame) = self.frame.as_mut() {
            frame.plan.end();
        }
    }

    fn present(&mut self) -> Result<(), RenderError> {
        let Some(ActiveFrame { output, plan }) = self.frame.take() else {
            return Err(RenderError::Fatal("present without begin_frame".into()));
        };
        self.ensure_instance_capacity(plan.instances().len());
        if !plan.instances().is_empty() {
            self.queue.write_buffer(
                &self.instance_buffer,
                0,
                bytemuck::cast_slice::<InstanceData, u8>(plan.instances()),
            );
        }
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let commands = self.encode(&plan, &view)?;
        self.queue.submit(std::iter::once(commands));
        output.present();
        Ok(())
    }
}

impl Layouts {
    fn new(device: &wgpu::Device) -> Self {
        let depth_texture = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Depth,
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                depth_texture(1),
                depth_texture(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });
        let material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let shadow = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        Self {
            frame,
            material,
            shadow,
        }
    }
}

fn vertex_layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
    const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
    ];
    const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 8] = wgpu::vertex_attr_array![
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
        8 => Float32x4,
        9 => Float32x4,
        10 => Float32x4,
    ];
    [
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VERTEX_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &INSTANCE_ATTRIBUTES,
        },
    ]
}

impl Pipelines {
    fn new(
        device: &wgpu::Device,
        layouts: &Layouts,
        surface_format: wgpu::TextureFormat,
        line_mode: bool,
    ) -> Self {
        let buffers = vertex_layouts();

        let shadow_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SHADOW_SHADER.into()),
        });
        let shadow_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow_pipeline_layout"),
            bind_group_layouts: &[&layouts.shadow],
            push_constant_ranges: &[],
        });
        let depth_only = |polygon_mode, label| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&shadow_layout),
                vertex: wgpu::VertexState {
                    module: &shadow_shader,
                    entry_point: Some("vs_shadow"),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },
                fragment: None,
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
        };
        let shadow = depth_only(wgpu::PolygonMode::Fill, "shadow_pipeline");
        let shadow_line =
            line_mode.then(|| depth_only(wgpu::PolygonMode::Line, "shadow_line_pipeline"));

        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SCENE_SHADER.into()),
        });
        let main_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("main_pipeline_layout"),
            bind_group_layouts: &[&layouts.frame, &layouts.material],
            push_constant_ranges: &[],
        });
        let main = |polygon_mode, label| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&main_layout),
                vertex: wgpu::VertexState {
                    module: &scene_shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &scene_shader,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: Some(wgpu::Face::Back),
                    polygon_mode,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            })
        };

        let fill = main(wgpu::PolygonMode::Fill, "main_pipeline");
        let line = line_mode.then(|| main(wgpu::PolygonMode::Line, "main_line_pipeline"));
        Self {
            shadow,
            fill,
            shadow_line,
            line,
        }
    }
}

fn depth_only_pass<'a>(
    label: &'a str,
    view: &'a wgpu::TextureView,
    clear: bool,
) -> wgpu::RenderPassDescriptor<'a> {
    wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view,
            depth_ops: Some(wgpu::Operations {
                load: if clear {
                    wgpu::LoadOp::Clear(1.0)
                } else {
                    wgpu::LoadOp::Load
                },
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: u32) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("instance_buffer"),
        size: capacity as u64 * std::mem::size_of::<InstanceData>() as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_depth_texture(
    device: &wgpu::Device,
    extent: Extent,
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: extent.width.max(1),
            height: extent.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}
