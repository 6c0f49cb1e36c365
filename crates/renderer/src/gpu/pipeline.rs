//! Render pipelines for the three passes: gradient, blit upscale, grain
//! overlay. All of them draw the same full-screen quad; only the fragment
//! stages differ.

use std::borrow::Cow;

use wgpu::util::DeviceExt;

use crate::error::{RenderError, ShaderStage};
use crate::source::ShaderTemplate;

/// Two counter-clockwise triangles covering clip space.
const QUAD_VERTICES: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];

pub(crate) const QUAD_VERTEX_COUNT: u32 = QUAD_VERTICES.len() as u32;

const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

/// Texel rows run top-down while clip-space y runs up, so the blit flips v
/// to keep the upscaled image oriented like a direct render.
const BLIT_FRAGMENT_SOURCE: &str = r"#version 450

layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_colour;

layout(set = 0, binding = 0) uniform texture2D source_texture;
layout(set = 0, binding = 1) uniform sampler source_sampler;

void main() {
    vec2 uv = vec2(v_uv.x, 1.0 - v_uv.y);
    out_colour = texture(sampler2D(source_texture, source_sampler), uv);
}
";

const GRAIN_FRAGMENT_SOURCE: &str = r"#version 450

layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_colour;

layout(std140, set = 0, binding = 0) uniform OverlayParams {
    vec2 tiling;
} ubo;

layout(set = 0, binding = 1) uniform texture2D grain_texture;
layout(set = 0, binding = 2) uniform sampler grain_sampler;

void main() {
    out_colour = texture(sampler2D(grain_texture, grain_sampler), v_uv * ubo.tiling);
}
";

pub(crate) fn create_quad_buffer(device: &wgpu::Device) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("quad vertices"),
        contents: bytemuck::cast_slice(&QUAD_VERTICES),
        usage: wgpu::BufferUsages::VERTEX,
    })
}

fn quad_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &QUAD_ATTRIBUTES,
    }
}

/// Compiles one GLSL stage, trading wgpu's deferred validation for an
/// immediate result via an error scope.
fn compile_shader(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, RenderError> {
    let naga_stage = match stage {
        ShaderStage::Vertex => wgpu::naga::ShaderStage::Vertex,
        ShaderStage::Fragment => wgpu::naga::ShaderStage::Fragment,
    };
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(source),
            stage: naga_stage,
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(RenderError::ShaderCompile {
            stage,
            log: error.to_string(),
        });
    }
    Ok(module)
}

pub(crate) fn compile_vertex_module(
    device: &wgpu::Device,
    template: &ShaderTemplate,
) -> Result<wgpu::ShaderModule, RenderError> {
    compile_shader(
        device,
        "quad vertex shader",
        template.vertex_source(),
        ShaderStage::Vertex,
    )
}

/// Links a pipeline under an error scope so broken stage interfaces surface
/// as a diagnostic instead of a deferred device error.
fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    vertex_module: &wgpu::ShaderModule,
    fragment_module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> Result<wgpu::RenderPipeline, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vertex_module,
            entry_point: Some("main"),
            buffers: &[quad_vertex_layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
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
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(RenderError::ShaderLink {
            log: error.to_string(),
        });
    }
    Ok(pipeline)
}

/// The generated gradient pass, rendering into the downscaled offscreen
/// target.
pub(crate) struct GradientPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub uniform_layout: wgpu::BindGroupLayout,
}

impl GradientPipeline {
    pub fn new(
        device: &wgpu::Device,
        vertex_module: &wgpu::ShaderModule,
        template: &ShaderTemplate,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let fragment_module = compile_shader(
            device,
            "gradient fragment shader",
            &template.fragment_source(),
            ShaderStage::Fragment,
        )?;
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gradient uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gradient pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });
        let pipeline = create_pipeline(
            device,
            "gradient pipeline",
            &layout,
            vertex_module,
            &fragment_module,
            format,
            None,
        )?;
        Ok(Self {
            pipeline,
            uniform_layout,
        })
    }
}

/// Upscales the offscreen gradient onto the surface.
pub(crate) struct BlitPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_layout: wgpu::BindGroupLayout,
}

impl BlitPipeline {
    pub fn new(
        device: &wgpu::Device,
        vertex_module: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let fragment_module = compile_shader(
            device,
            "blit fragment shader",
            BLIT_FRAGMENT_SOURCE,
            ShaderStage::Fragment,
        )?;
        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit pipeline layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });
        let pipeline = create_pipeline(
            device,
            "blit pipeline",
            &layout,
            vertex_module,
            &fragment_module,
            format,
            None,
        )?;
        Ok(Self {
            pipeline,
            bind_layout,
        })
    }
}

/// Composites the tiled grain tile over the blitted gradient with
/// source-over blending.
pub(crate) struct GrainPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_layout: wgpu::BindGroupLayout,
}

impl GrainPipeline {
    pub fn new(
        device: &wgpu::Device,
        vertex_module: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        let fragment_module = compile_shader(
            device,
            "grain fragment shader",
            GRAIN_FRAGMENT_SOURCE,
            ShaderStage::Fragment,
        )?;
        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grain layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                sampler_entry(2),
            ],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grain pipeline layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });
        let pipeline = create_pipeline(
            device,
            "grain pipeline",
            &layout,
            vertex_module,
            &fragment_module,
            format,
            Some(wgpu::BlendState::ALPHA_BLENDING),
        )?;
        Ok(Self {
            pipeline,
            bind_layout,
        })
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}
