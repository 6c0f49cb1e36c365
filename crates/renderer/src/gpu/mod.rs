//! GPU orchestration for the gradient pipeline.
//!
//! - `context` owns the wgpu instance/surface/device wiring and swapchain
//!   reconfiguration.
//! - `pipeline` turns generated and static GLSL into render pipelines that
//!   share one full-screen quad.
//! - `uniforms` packs the std140 gradient block from resolved byte offsets
//!   and hands it to the queue each frame.
//! - `state` glues everything together behind the `GpuState` API used by
//!   `window`.

mod context;
mod pipeline;
mod state;
mod uniforms;

pub(crate) use state::GpuState;
