//! Deterministic generation of the travelling-wave field.
//!
//! The gradient is driven by a handful of directional sine waves whose
//! parameters come from a seeded random stream, so the same seed always
//! reproduces the same field. Only the phase (`offset`) mutates after
//! creation; everything else is fixed for the lifetime of a session.

use std::f32::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Number of waves summed into the gradient field.
pub const WAVE_COUNT: usize = 6;

/// One directional sine wave.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveParameters {
    /// Direction of travel in radians.
    pub angle: f32,
    /// Unit direction vector, `[cos(angle), sin(angle)]`.
    pub components: [f32; 2],
    /// Amplitude contribution, in `[0.75, 1.0)`.
    pub intensity: f32,
    /// Spatial frequency, in `(1.25, 2.5]`.
    pub frequency: f32,
    /// Current phase. Starts in `[0, 1)` and grows without bound; the
    /// shader wraps it through the sine argument.
    pub offset: f32,
    /// Phase increment per frame, in `[0, 0.006)`.
    pub movement: f32,
}

impl WaveParameters {
    /// Draws one wave from the stream. Five samples, in a fixed order: the
    /// stream is stateful, so the draw order is part of the contract.
    fn draw(rng: &mut StdRng) -> Self {
        let angle = rng.gen::<f32>() * TAU;
        let intensity = 0.75 + rng.gen::<f32>() * 0.25;
        let frequency = 2.5 - rng.gen::<f32>() * 1.25;
        let offset = rng.gen::<f32>();
        let movement = rng.gen::<f32>() * 0.6 / 100.0;
        Self {
            angle,
            components: [angle.cos(), angle.sin()],
            intensity,
            frequency,
            offset,
            movement,
        }
    }

    /// Advances the phase by the given number of frames.
    pub fn advance(&mut self, frames: f32) {
        self.offset += self.movement * frames;
    }
}

/// Generates a wave field of `count` waves from a 64-bit seed.
pub fn generate_waves(count: usize, seed: u64) -> Vec<WaveParameters> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count).map(|_| WaveParameters::draw(&mut rng)).collect()
}

/// Sum of the field's intensities. Computed once per field and cached by
/// the session; the shader divides the accumulated wave sum by it, and it
/// stays valid because intensities never change after generation.
pub fn max_intensity(waves: &[WaveParameters]) -> f32 {
    waves.iter().map(|wave| wave.intensity).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_reproduces_the_field() {
        assert_eq!(generate_waves(WAVE_COUNT, 7), generate_waves(WAVE_COUNT, 7));
    }

    #[test]
    fn different_seeds_differ() {
        assert_ne!(generate_waves(WAVE_COUNT, 7), generate_waves(WAVE_COUNT, 8));
    }

    #[test]
    fn parameters_stay_in_range() {
        for seed in 0..32 {
            for wave in generate_waves(WAVE_COUNT, seed) {
                assert!((0.0..TAU).contains(&wave.angle));
                assert!((0.75..1.0).contains(&wave.intensity));
                assert!(wave.frequency > 1.25 && wave.frequency <= 2.5);
                assert!((0.0..1.0).contains(&wave.offset));
                assert!((0.0..0.006).contains(&wave.movement));
            }
        }
    }

    #[test]
    fn components_are_unit_vectors() {
        for wave in generate_waves(WAVE_COUNT, 3) {
            let [x, y] = wave.components;
            assert!((x * x + y * y - 1.0).abs() < 1e-5);
            assert!((x - wave.angle.cos()).abs() < 1e-6);
            assert!((y - wave.angle.sin()).abs() < 1e-6);
        }
    }

    #[test]
    fn advance_scales_movement_by_frame_count() {
        let mut wave = generate_waves(1, 11).remove(0);
        let start = wave.offset;
        wave.advance(2.5);
        assert!((wave.offset - start - wave.movement * 2.5).abs() < 1e-6);
    }

    #[test]
    fn max_intensity_is_the_sum_of_intensities() {
        for count in [1, 2, WAVE_COUNT] {
            let waves = generate_waves(count, 5);
            let expected: f32 = waves.iter().map(|wave| wave.intensity).sum();
            assert_eq!(max_intensity(&waves), expected);
        }
    }
}
