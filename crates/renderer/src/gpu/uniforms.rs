//! CPU-side packing of the generated std140 gradient block.
//!
//! The block's shape depends on the wave and colour counts, so instead of a
//! fixed `#[repr(C)]` struct the session packs bytes at offsets resolved
//! from the template's layout. Resolution happens once at session build;
//! a name the layout does not know fails the build, not a frame.

use crate::error::RenderError;
use crate::palette::Colour;
use crate::source::UniformLayout;
use crate::waves::WaveParameters;

#[derive(Debug, Clone, Copy)]
struct WaveLocations {
    intensity: usize,
    frequency: usize,
    offset: usize,
    components: usize,
}

#[derive(Debug, Clone)]
struct GradientLocations {
    resolution: usize,
    max_intensity: usize,
    waves: Vec<WaveLocations>,
    colours: Vec<usize>,
}

impl GradientLocations {
    fn resolve(
        layout: &UniformLayout,
        wave_count: usize,
        colour_count: usize,
    ) -> Result<Self, RenderError> {
        let mut waves = Vec::with_capacity(wave_count);
        for index in 0..wave_count {
            waves.push(WaveLocations {
                intensity: layout.offset(&format!("waves[{index}].intensity"))?,
                frequency: layout.offset(&format!("waves[{index}].frequency"))?,
                offset: layout.offset(&format!("waves[{index}].offset"))?,
                components: layout.offset(&format!("waves[{index}].components"))?,
            });
        }
        let mut colours = Vec::with_capacity(colour_count);
        for index in 0..colour_count {
            colours.push(layout.offset(&format!("colours[{index}]"))?);
        }
        Ok(Self {
            resolution: layout.offset("resolution")?,
            max_intensity: layout.offset("max_intensity")?,
            waves,
            colours,
        })
    }
}

/// Staging copy of the uniform block, written through the queue once per
/// frame.
pub(crate) struct UniformBlock {
    bytes: Vec<u8>,
    locations: GradientLocations,
}

impl UniformBlock {
    pub fn new(
        layout: &UniformLayout,
        wave_count: usize,
        colour_count: usize,
    ) -> Result<Self, RenderError> {
        let locations = GradientLocations::resolve(layout, wave_count, colour_count)?;
        Ok(Self {
            bytes: vec![0; layout.size()],
            locations,
        })
    }

    fn write_f32(&mut self, offset: usize, value: f32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_resolution(&mut self, width: f32, height: f32) {
        let base = self.locations.resolution;
        self.write_f32(base, width);
        self.write_f32(base + 4, height);
    }

    pub fn set_max_intensity(&mut self, value: f32) {
        self.write_f32(self.locations.max_intensity, value);
    }

    pub fn set_wave(&mut self, index: usize, wave: &WaveParameters) {
        let slot = self.locations.waves[index];
        self.write_f32(slot.intensity, wave.intensity);
        self.write_f32(slot.frequency, wave.frequency);
        self.write_f32(slot.offset, wave.offset);
        self.write_f32(slot.components, wave.components[0]);
        self.write_f32(slot.components + 4, wave.components[1]);
    }

    pub fn set_colour(&mut self, index: usize, colour: Colour) {
        let base = self.locations.colours[index];
        let channels = colour.normalised();
        self.write_f32(base, channels[0]);
        self.write_f32(base + 4, channels[1]);
        self.write_f32(base + 8, channels[2]);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
