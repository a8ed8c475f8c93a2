use std::mem;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::app;
use crate::galaxy::PointCloud;
use crate::scene::PointCloudBackend;
use crate::ui::UiFrame;

/// Camera state shared by every draw in a frame.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GlobalUniform {
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
    /// Viewport width and height in pixels; zw unused.
    viewport: [f32; 4],
}

/// Per-drawable state: model transform and point size in world units.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct DrawUniform {
    model: [[f32; 4]; 4],
    /// x is the point diameter in world units; yzw unused.
    point_params: [f32; 4],
}

/// One uploaded point cloud: interleaved position and color per instance.
pub struct PointBatch {
    instances: wgpu::Buffer,
    instance_count: u32,
    point_size: f32,
}

/// Per-frame inputs assembled by the event loop.
pub struct FrameParams {
    pub view: Mat4,
    pub proj: Mat4,
    pub galaxy_angle: f32,
    pub starfield_angle: f32,
}

struct DrawBinding {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl DrawBinding {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: mem::size_of::<DrawUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }
}

/// Owns the GPU surface and draws point batches plus the settings panel.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    galaxy_pipeline: wgpu::RenderPipeline,
    starfield_pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    galaxy_draw: DrawBinding,
    starfield_draw: DrawBinding,
    egui: egui_wgpu::Renderer,
}

impl Renderer {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = app::surface_size(window.inner_size(), window.scale_factor());

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        // The surface holds a raw handle into the window; keeping the Arc
        // in the renderer keeps the handle valid.
        let surface = unsafe { instance.create_surface(window.as_ref()) }
            .context("failed to create rendering surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible graphics adapter found")?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("galaxy-device"),
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("failed to acquire graphics device")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(caps.formats[0]);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            // Animation-frame pacing: one frame per vertical sync.
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("points-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let global_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("global-bind-layout"),
            entries: &[uniform_layout_entry(mem::size_of::<GlobalUniform>())],
        });
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw-bind-layout"),
            entries: &[uniform_layout_entry(mem::size_of::<DrawUniform>())],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("points-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &draw_layout],
            push_constant_ranges: &[],
        });

        let galaxy_pipeline = build_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            format,
            ADDITIVE_BLEND,
            "galaxy-pipeline",
        );
        let starfield_pipeline = build_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            format,
            wgpu::BlendState::ALPHA_BLENDING,
            "starfield-pipeline",
        );

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: mem::size_of::<GlobalUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });
        let galaxy_draw = DrawBinding::new(&device, &draw_layout, "galaxy-draw-uniform");
        let starfield_draw = DrawBinding::new(&device, &draw_layout, "starfield-draw-uniform");

        let egui = egui_wgpu::Renderer::new(&device, format, None, 1);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            galaxy_pipeline,
            starfield_pipeline,
            global_buffer,
            global_bind_group,
            galaxy_draw,
            starfield_draw,
            egui,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Draws the starfield, then the galaxy with additive blending, then
    /// the panel, all into one pass against a black clear.
    pub fn render(
        &mut self,
        frame: &FrameParams,
        galaxy: Option<&PointBatch>,
        starfield: &PointBatch,
        ui: &UiFrame,
    ) -> std::result::Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let target = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let globals = GlobalUniform {
            view: frame.view.to_cols_array_2d(),
            proj: frame.proj.to_cols_array_2d(),
            viewport: [self.config.width as f32, self.config.height as f32, 0.0, 0.0],
        };
        self.queue
            .write_buffer(&self.global_buffer, 0, bytemuck::bytes_of(&globals));
        self.write_draw_uniform(&self.starfield_draw, frame.starfield_angle, starfield);
        if let Some(batch) = galaxy {
            self.write_draw_uniform(&self.galaxy_draw, frame.galaxy_angle, batch);
        }

        // The panel rasterizes at the same capped ratio the surface was
        // sized with, not the native one.
        let screen = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: app::render_pixel_ratio(ui.pixels_per_point),
        };
        for (id, delta) in &ui.textures_delta.set {
            self.egui.update_texture(&self.device, &self.queue, *id, delta);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        let ui_commands =
            self.egui
                .update_buffers(&self.device, &self.queue, &mut encoder, &ui.primitives, &screen);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("points-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: true,
                },
            })],
            depth_stencil_attachment: None,
        });

        pass.set_bind_group(0, &self.global_bind_group, &[]);
        pass.set_pipeline(&self.starfield_pipeline);
        pass.set_bind_group(1, &self.starfield_draw.bind_group, &[]);
        draw_batch(&mut pass, starfield);
        if let Some(batch) = galaxy {
            pass.set_pipeline(&self.galaxy_pipeline);
            pass.set_bind_group(1, &self.galaxy_draw.bind_group, &[]);
            draw_batch(&mut pass, batch);
        }
        self.egui.render(&mut pass, &ui.primitives, &screen);
        drop(pass);

        self.queue
            .submit(ui_commands.into_iter().chain(std::iter::once(encoder.finish())));
        output.present();

        for id in &ui.textures_delta.free {
            self.egui.free_texture(id);
        }

        Ok(())
    }

    fn write_draw_uniform(&self, binding: &DrawBinding, angle: f32, batch: &PointBatch) {
        let uniform = DrawUniform {
            model: Mat4::from_rotation_y(angle).to_cols_array_2d(),
            point_params: [batch.point_size, 0.0, 0.0, 0.0],
        };
        self.queue
            .write_buffer(&binding.buffer, 0, bytemuck::bytes_of(&uniform));
    }
}

impl PointCloudBackend for Renderer {
    type Batch = PointBatch;

    fn upload(&mut self, cloud: &PointCloud, point_size: f32) -> PointBatch {
        let data = interleave(cloud);
        let instances = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("point-instances"),
                contents: bytemuck::cast_slice(&data),
                usage: wgpu::BufferUsages::VERTEX,
            });
        PointBatch {
            instances,
            instance_count: cloud.len() as u32,
            point_size,
        }
    }

    fn release(&mut self, batch: PointBatch) {
        batch.instances.destroy();
    }
}

fn draw_batch<'a>(pass: &mut wgpu::RenderPass<'a>, batch: &'a PointBatch) {
    if batch.instance_count == 0 {
        return;
    }
    pass.set_vertex_buffer(0, batch.instances.slice(..));
    pass.draw(0..6, 0..batch.instance_count);
}

fn uniform_layout_entry(min_size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(min_size as u64),
        },
        count: None,
    }
}

const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    blend: wgpu::BlendState,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: (6 * mem::size_of::<f32>()) as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

/// Packs a cloud into per-instance [x, y, z, r, g, b] records.
fn interleave(cloud: &PointCloud) -> Vec<f32> {
    let mut data = Vec::with_capacity(cloud.len() * 6);
    for i in 0..cloud.len() {
        let p = cloud.position(i);
        let c = cloud.color(i);
        data.extend_from_slice(&[p.x, p.y, p.z, c.x, c.y, c.z]);
    }
    data
}

// Each point is an instanced quad expanded in view space. The footprint is
// clamped to one pixel so high point counts at tiny sizes stay visible.
const SHADER: &str = r#"
struct Globals {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    viewport: vec4<f32>,
};

struct Draw {
    model: mat4x4<f32>,
    point_params: vec4<f32>,
};

@group(0) @binding(0) var<uniform> globals: Globals;
@group(1) @binding(0) var<uniform> draw: Draw;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let corner = corners[vertex_index];

    let view_center = globals.view * draw.model * vec4<f32>(position, 1.0);
    let dist = max(-view_center.z, 1e-4);
    let size_px = draw.point_params.x * globals.proj[1][1] * globals.viewport.y / (2.0 * dist);
    let half_extent = max(size_px, 1.0) * dist / (globals.proj[1][1] * globals.viewport.y);

    var out: VertexOutput;
    out.clip_position = globals.proj * (view_center + vec4<f32>(corner * half_extent, 0.0, 0.0));
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_packs_position_then_color_per_point() {
        let cloud = PointCloud {
            positions: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            colors: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
        };
        let data = interleave(&cloud);
        assert_eq!(
            data,
            vec![1.0, 2.0, 3.0, 0.1, 0.2, 0.3, 4.0, 5.0, 6.0, 0.4, 0.5, 0.6]
        );
    }

    #[test]
    fn uniform_layouts_stay_shader_compatible() {
        // mat4x4 + mat4x4 + vec4, then mat4x4 + vec4.
        assert_eq!(mem::size_of::<GlobalUniform>(), 144);
        assert_eq!(mem::size_of::<DrawUniform>(), 80);
    }
}
