//! Built-in values used when neither the command line nor the configuration
//! file supplies one.

use renderer::Colour;

/// Soft pastel ramp rendered when no palette is configured.
pub const BASE_PALETTE: [Colour; 4] = [
    Colour::new(163, 232, 255),
    Colour::new(236, 229, 255),
    Colour::new(255, 214, 226),
    Colour::new(255, 184, 201),
];

/// Initial window size in physical pixels.
pub const WINDOW_SIZE: (u32, u32) = (1200, 900);

/// Wave-field seed; a fixed seed keeps the background identical across runs.
pub const WAVE_SEED: u64 = 42;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_palette_matches_its_documented_hex_stops() {
        let hex: Vec<String> = BASE_PALETTE.iter().map(|stop| stop.to_hex()).collect();
        assert_eq!(hex, ["#a3e8ff", "#ece5ff", "#ffd6e2", "#ffb8c9"]);
    }
}
