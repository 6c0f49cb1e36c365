//! Renderer crate for wavepaper.
//!
//! Glues the deterministic wave field, the generated gradient shader, and
//! the grain overlay into a windowed `wgpu` pipeline. The overall flow is:
//!
//! ```text
//!   CLI / wavepaper
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ winit event loop ──▶ GpuState::render_frame()
//!          ▲              │                       │
//!          │              ├─▶ FrameLoop gate      ├─▶ gradient ─▶ offscreen
//!          │              └─▶ PowerMonitor        └─▶ blit + grain ─▶ surface
//! ```
//!
//! The fragment shader is generated per session with the wave and colour
//! counts compiled into its array lengths; `scheduler` decides when frames
//! are requested at all, based on visibility, the pause flag, and the
//! power-probe verdicts.

pub mod error;
pub mod grain;
pub mod palette;
pub mod source;
pub mod types;
pub mod waves;

mod gpu;
mod window;

use anyhow::Result;

pub use error::{RenderError, ShaderStage};
pub use grain::{GrainTexture, DEFAULT_GRAIN_SIZE};
pub use palette::{Colour, ColourParseError, Palette};
pub use source::{ShaderTemplate, UniformLayout};
pub use types::{RendererConfig, DEFAULT_DOWNSCALE};
pub use waves::{generate_waves, max_intensity, WaveParameters, WAVE_COUNT};

/// Thin entry point owning the start-up configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Opens the window and drives the render loop until close.
    pub fn run(self) -> Result<()> {
        window::run(self.config)
    }
}
