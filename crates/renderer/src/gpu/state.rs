//! Frame orchestration: owns the context, the gradient session, and the
//! two static surface passes, and turns redraw callbacks into pixels.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;
use wgpu::util::{DeviceExt, TextureDataOrder};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::error::RenderError;
use crate::grain::GrainTexture;
use crate::palette::Palette;
use crate::source::ShaderTemplate;
use crate::types::{downscaled_size, RendererConfig};
use crate::waves::{self, WaveParameters};

use super::context::GpuContext;
use super::pipeline::{self, BlitPipeline, GradientPipeline, GrainPipeline, QUAD_VERTEX_COUNT};
use super::uniforms::UniformBlock;

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Everything tied to one wave field and palette. The stop count is baked
/// into the compiled pipeline, so a palette of a different length means
/// dropping the whole session and building a fresh one, never patching.
struct BackgroundSession {
    waves: Vec<WaveParameters>,
    max_intensity: f32,
    pipeline: GradientPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: UniformBlock,
}

impl BackgroundSession {
    fn new(
        device: &wgpu::Device,
        vertex_module: &wgpu::ShaderModule,
        template: &ShaderTemplate,
        waves: Vec<WaveParameters>,
        palette: &Palette,
    ) -> Result<Self, RenderError> {
        let layout = template.uniform_layout();
        let mut uniforms =
            UniformBlock::new(&layout, template.wave_count(), template.colour_count())?;
        let pipeline = GradientPipeline::new(device, vertex_module, template, OFFSCREEN_FORMAT)?;
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gradient uniforms"),
            size: layout.size() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gradient bind group"),
            layout: &pipeline.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let max_intensity = waves::max_intensity(&waves);
        uniforms.set_max_intensity(max_intensity);
        for (index, colour) in palette.stops().iter().enumerate() {
            uniforms.set_colour(index, *colour);
        }

        Ok(Self {
            waves,
            max_intensity,
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
        })
    }

    /// Advances the wave phases and refreshes the staging block. The whole
    /// block ships every frame; colours and `max_intensity` ride along
    /// unchanged.
    fn advance(&mut self, frames: f32) {
        for (index, wave) in self.waves.iter_mut().enumerate() {
            wave.advance(frames);
            self.uniforms.set_wave(index, wave);
        }
    }
}

struct OffscreenTarget {
    view: wgpu::TextureView,
    size: (u32, u32),
}

impl OffscreenTarget {
    fn new(device: &wgpu::Device, size: (u32, u32)) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("gradient target"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            size,
        }
    }
}

/// Blit pass resources; the bind group follows the offscreen target.
struct BlitPass {
    pipeline: BlitPipeline,
    sampler: wgpu::Sampler,
    bind_group: wgpu::BindGroup,
}

impl BlitPass {
    fn new(
        device: &wgpu::Device,
        vertex_module: &wgpu::ShaderModule,
        surface_format: wgpu::TextureFormat,
        offscreen: &OffscreenTarget,
    ) -> Result<Self, RenderError> {
        let pipeline = BlitPipeline::new(device, vertex_module, surface_format)?;
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("blit sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let bind_group = Self::bind(device, &pipeline, &sampler, offscreen);
        Ok(Self {
            pipeline,
            sampler,
            bind_group,
        })
    }

    fn bind(
        device: &wgpu::Device,
        pipeline: &BlitPipeline,
        sampler: &wgpu::Sampler,
        offscreen: &OffscreenTarget,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit bind group"),
            layout: &pipeline.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&offscreen.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn retarget(&mut self, device: &wgpu::Device, offscreen: &OffscreenTarget) {
        self.bind_group = Self::bind(device, &self.pipeline, &self.sampler, offscreen);
    }
}

/// Grain overlay resources. The tile is uploaded once; only the tiling
/// factor tracks the surface size.
struct GrainPass {
    pipeline: GrainPipeline,
    bind_group: wgpu::BindGroup,
    tiling_buffer: wgpu::Buffer,
    tile_size: u32,
}

impl GrainPass {
    fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        vertex_module: &wgpu::ShaderModule,
        surface_format: wgpu::TextureFormat,
        grain: &GrainTexture,
        surface_size: (u32, u32),
    ) -> Result<Self, RenderError> {
        let pipeline = GrainPipeline::new(device, vertex_module, surface_format)?;
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("grain tile"),
                size: wgpu::Extent3d {
                    width: grain.size(),
                    height: grain.size(),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            TextureDataOrder::LayerMajor,
            grain.pixels(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("grain sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let tiling_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grain tiling"),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grain bind group"),
            layout: &pipeline.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: tiling_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });
        let pass = Self {
            pipeline,
            bind_group,
            tiling_buffer,
            tile_size: grain.size().max(1),
        };
        pass.update_tiling(queue, surface_size);
        Ok(pass)
    }

    /// One repeat of the tile per `tile_size` pixels of surface.
    fn update_tiling(&self, queue: &wgpu::Queue, surface_size: (u32, u32)) {
        let tiling = [
            surface_size.0 as f32 / self.tile_size as f32,
            surface_size.1 as f32 / self.tile_size as f32,
        ];
        queue.write_buffer(&self.tiling_buffer, 0, bytemuck::cast_slice(&tiling));
    }
}

pub(crate) struct GpuState {
    window: Arc<Window>,
    context: GpuContext,
    quad: wgpu::Buffer,
    session: BackgroundSession,
    offscreen: OffscreenTarget,
    blit: BlitPass,
    grain: GrainPass,
    downscale: u32,
    frames_since_stats: u32,
    last_stats: Instant,
}

impl GpuState {
    pub fn new(
        window: Arc<Window>,
        config: &RendererConfig,
        waves: Vec<WaveParameters>,
        grain: &GrainTexture,
    ) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let context = GpuContext::new(window.as_ref(), size)?;
        let device = &context.device;

        let template = ShaderTemplate::new(waves.len(), config.palette.stop_count())?;
        let vertex_module = pipeline::compile_vertex_module(device, &template)?;
        let quad = pipeline::create_quad_buffer(device);

        let surface_size = context.surface_size();
        let offscreen =
            OffscreenTarget::new(device, downscaled_size(surface_size, config.downscale));
        let mut session =
            BackgroundSession::new(device, &vertex_module, &template, waves, &config.palette)?;
        session
            .uniforms
            .set_resolution(offscreen.size.0 as f32, offscreen.size.1 as f32);

        let blit = BlitPass::new(device, &vertex_module, context.surface_format(), &offscreen)?;
        let grain = GrainPass::new(
            device,
            &context.queue,
            &vertex_module,
            context.surface_format(),
            grain,
            surface_size,
        )?;

        debug!(
            surface = ?surface_size,
            target = ?offscreen.size,
            waves = session.waves.len(),
            stops = config.palette.stop_count(),
            "gradient session ready"
        );

        Ok(Self {
            window,
            context,
            quad,
            session,
            offscreen,
            blit,
            grain,
            downscale: config.downscale,
            frames_since_stats: 0,
            last_stats: Instant::now(),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        let (width, height) = self.context.surface_size();
        PhysicalSize::new(width, height)
    }

    /// Reconfigures the surface and rebuilds the offscreen target at the
    /// new downscaled size. Wave state is untouched.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        let surface_size = self.context.surface_size();
        let target = downscaled_size(surface_size, self.downscale);
        if target != self.offscreen.size {
            self.offscreen = OffscreenTarget::new(&self.context.device, target);
            self.blit.retarget(&self.context.device, &self.offscreen);
        }
        self.session
            .uniforms
            .set_resolution(target.0 as f32, target.1 as f32);
        self.grain.update_tiling(&self.context.queue, surface_size);
        debug!(surface = ?surface_size, target = ?target, "resized gradient target");
    }

    /// Renders one frame: gradient into the offscreen target, then blit
    /// and grain overlay onto the surface.
    pub fn render_frame(&mut self, frames: f32) -> Result<(), wgpu::SurfaceError> {
        self.session.advance(frames);
        self.context.queue.write_buffer(
            &self.session.uniform_buffer,
            0,
            self.session.uniforms.as_bytes(),
        );

        let frame = self.context.surface.get_current_texture()?;
        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("gradient pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.offscreen.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.session.pipeline.pipeline);
            pass.set_bind_group(0, &self.session.uniform_bind_group, &[]);
            pass.set_vertex_buffer(0, self.quad.slice(..));
            pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("present pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.blit.pipeline.pipeline);
            pass.set_bind_group(0, &self.blit.bind_group, &[]);
            pass.set_vertex_buffer(0, self.quad.slice(..));
            pass.draw(0..QUAD_VERTEX_COUNT, 0..1);

            pass.set_pipeline(&self.grain.pipeline.pipeline);
            pass.set_bind_group(0, &self.grain.bind_group, &[]);
            pass.set_vertex_buffer(0, self.quad.slice(..));
            pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        self.frames_since_stats += 1;
        let now = Instant::now();
        if now.saturating_duration_since(self.last_stats) >= Duration::from_secs(1) {
            debug!(
                fps = self.frames_since_stats,
                max_intensity = self.session.max_intensity,
                "render stats"
            );
            self.frames_since_stats = 0;
            self.last_stats = now;
        }

        Ok(())
    }
}
