//! Windowed host: the event loop that feeds visibility, pause input, and
//! power probing into the frame gate, and redraw callbacks into the GPU
//! state.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use scheduler::power::read_charging_state;
use scheduler::{FrameLoop, FrameRequester, PowerMonitor, RequestId};

use crate::gpu::GpuState;
use crate::grain::GrainTexture;
use crate::types::RendererConfig;
use crate::waves;

/// Wave phase units advanced per redraw callback.
const FRAME_UNITS_PER_REDRAW: f32 = 1.0;

/// Frame scheduling over the compositor's redraw machinery. A redraw
/// cannot be revoked once asked for, so cancellation is bookkeeping: the
/// frame loop forgets the pending id and the orphaned callback draws
/// nothing.
struct RedrawRequester {
    window: Arc<Window>,
    next_id: RequestId,
}

impl FrameRequester for RedrawRequester {
    fn request_frame(&mut self) -> RequestId {
        self.next_id += 1;
        self.window.request_redraw();
        self.next_id
    }

    fn cancel_frame(&mut self, _id: RequestId) {}
}

fn is_space(key: &Key) -> bool {
    matches!(key, Key::Named(NamedKey::Space))
        || matches!(key, Key::Character(value) if value.as_str() == " ")
}

pub(crate) fn run(config: RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window = WindowBuilder::new()
        .with_title("wavepaper")
        .with_inner_size(PhysicalSize::new(config.window_size.0, config.window_size.1))
        .build(&event_loop)
        .context("failed to create window")?;
    let window = Arc::new(window);

    let waves = waves::generate_waves(waves::WAVE_COUNT, config.wave_seed);
    let grain = GrainTexture::generate(config.grain_size);
    let mut state = GpuState::new(Arc::clone(&window), &config, waves, &grain)?;

    let mut requester = RedrawRequester { window, next_id: 0 };
    let mut frame_loop = FrameLoop::new();
    let mut monitor = PowerMonitor::new(
        config.device_class,
        config.probe_delay,
        config.probe_interval,
        Instant::now(),
    );
    frame_loop.set_charging(read_charging_state(), &mut requester);
    frame_loop.start(&mut requester);

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);
            match event {
                Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            elwt.exit();
                        }
                        WindowEvent::Resized(new_size) => {
                            state.resize(new_size);
                        }
                        WindowEvent::ScaleFactorChanged {
                            mut inner_size_writer,
                            ..
                        } => {
                            let _ = inner_size_writer.request_inner_size(state.size());
                        }
                        WindowEvent::Occluded(occluded) => {
                            frame_loop.set_visible(!occluded, &mut requester);
                        }
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.state == ElementState::Pressed
                                && !event.repeat
                                && is_space(&event.logical_key)
                            {
                                let paused = frame_loop.toggle_paused(&mut requester);
                                info!(paused, "pause toggled");
                            }
                        }
                        WindowEvent::RedrawRequested => {
                            if !frame_loop.begin_frame() {
                                return;
                            }
                            match state.render_frame(FRAME_UNITS_PER_REDRAW) {
                                Ok(()) => {
                                    if let Some(verdict) = monitor.record_frame(Instant::now()) {
                                        frame_loop.set_verdict(verdict, &mut requester);
                                    }
                                    frame_loop.complete_frame(&mut requester);
                                }
                                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                                    state.resize(state.size());
                                    frame_loop.complete_frame(&mut requester);
                                }
                                Err(wgpu::SurfaceError::OutOfMemory) => {
                                    error!("surface out of memory; exiting");
                                    elwt.exit();
                                }
                                Err(wgpu::SurfaceError::Timeout) => {
                                    warn!("surface timeout; retrying next frame");
                                    frame_loop.complete_frame(&mut requester);
                                }
                                Err(other) => {
                                    warn!(error = ?other, "surface error; retrying next frame");
                                    frame_loop.complete_frame(&mut requester);
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    let now = Instant::now();
                    if let Some(verdict) = monitor.poll(now, frame_loop.should_animate()) {
                        frame_loop.set_charging(read_charging_state(), &mut requester);
                        frame_loop.set_verdict(verdict, &mut requester);
                    }
                    // While animating the redraw chain keeps the loop awake;
                    // parked, it still wakes for the probe cadence.
                    if !frame_loop.should_animate() {
                        if let Some(deadline) = monitor.next_deadline(now) {
                            elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                        }
                    }
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop error: {err}"))
}
