use std::time::Duration;

use scheduler::DeviceClass;

use crate::palette::Palette;

/// Default ratio between the window and the offscreen gradient target.
pub const DEFAULT_DOWNSCALE: u32 = 3;

/// Everything the renderer needs to bring a window up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial window size in physical pixels.
    pub window_size: (u32, u32),
    /// Gradient colour stops; the stop count shapes the generated shader.
    pub palette: Palette,
    /// Seed for the deterministic wave field.
    pub wave_seed: u64,
    /// Gradient render-target downscale factor.
    pub downscale: u32,
    /// Edge length of the grain tile in pixels.
    pub grain_size: u32,
    /// Probe branch for the power heuristics.
    pub device_class: DeviceClass,
    /// Settling delay before the first power probe.
    pub probe_delay: Duration,
    /// Interval between subsequent probes.
    pub probe_interval: Duration,
}

/// Offscreen target size for a surface size and downscale factor. Integer
/// division per axis, clamped to at least one pixel.
pub fn downscaled_size(surface: (u32, u32), downscale: u32) -> (u32, u32) {
    let factor = downscale.max(1);
    ((surface.0 / factor).max(1), (surface.1 / factor).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downscale_divides_each_axis() {
        assert_eq!(downscaled_size((1200, 900), 3), (400, 300));
        assert_eq!(downscaled_size((1201, 901), 3), (400, 300));
    }

    #[test]
    fn downscale_never_reaches_zero() {
        assert_eq!(downscaled_size((2, 2), 3), (1, 1));
        assert_eq!(downscaled_size((0, 0), 3), (1, 1));
        assert_eq!(downscaled_size((640, 480), 0), (640, 480));
    }
}
