//! Static film-grain overlay tile.
//!
//! Generated once per process from an unseeded noise source, so every run
//! gets its own pattern; resizes and palette changes never regenerate it.

use std::io::Cursor;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, RgbaImage};
use noise::{NoiseFn, Simplex};

/// Default edge length of the grain tile, in pixels.
pub const DEFAULT_GRAIN_SIZE: u32 = 400;

/// Peak grain opacity; noise in [-1, 1] scales to alpha and the store
/// clamps negatives to fully transparent.
const ALPHA_SCALE: f64 = 150.0;

/// A square RGBA8 noise tile: white pixels whose alpha follows a simplex
/// field sampled at integer coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrainTexture {
    size: u32,
    pixels: Vec<u8>,
}

impl GrainTexture {
    /// Generates a tile with a fresh random noise seed.
    pub fn generate(size: u32) -> Self {
        Self::seeded(size, rand::random())
    }

    /// Deterministic variant for tests.
    pub fn seeded(size: u32, seed: u32) -> Self {
        let field = Simplex::new(seed);
        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let sample = field.get([f64::from(x), f64::from(y)]);
                let alpha = (sample * ALPHA_SCALE).floor().clamp(0.0, 255.0) as u8;
                pixels.extend_from_slice(&[255, 255, 255, alpha]);
            }
        }
        Self { size, pixels }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Raw RGBA8 rows, top-left first.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn to_png(&self) -> Result<Vec<u8>> {
        let image = RgbaImage::from_raw(self.size, self.size, self.pixels.clone())
            .context("grain pixel buffer does not match its dimensions")?;
        let mut encoded = Cursor::new(Vec::new());
        image
            .write_to(&mut encoded, ImageFormat::Png)
            .context("failed to encode grain tile as png")?;
        Ok(encoded.into_inner())
    }

    /// PNG-encodes the tile and wraps it as a `data:image/png;base64,...`
    /// URL, ready for any consumer that takes an image reference.
    pub fn to_data_url(&self) -> Result<String> {
        let png = self.to_png()?;
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_matches_the_requested_size() {
        let grain = GrainTexture::seeded(8, 1);
        assert_eq!(grain.size(), 8);
        assert_eq!(grain.pixels().len(), 8 * 8 * 4);
    }

    #[test]
    fn pixels_are_white_with_bounded_alpha() {
        let grain = GrainTexture::seeded(16, 2);
        for pixel in grain.pixels().chunks_exact(4) {
            assert_eq!(&pixel[..3], &[255, 255, 255]);
            assert!(pixel[3] <= ALPHA_SCALE as u8);
        }
    }

    #[test]
    fn negative_noise_goes_fully_transparent() {
        let grain = GrainTexture::seeded(16, 3);
        assert!(grain.pixels().chunks_exact(4).any(|pixel| pixel[3] == 0));
    }

    #[test]
    fn same_seed_reproduces_the_tile() {
        assert_eq!(GrainTexture::seeded(16, 4), GrainTexture::seeded(16, 4));
        assert_ne!(GrainTexture::seeded(16, 4), GrainTexture::seeded(16, 5));
    }

    #[test]
    fn data_url_wraps_a_png() {
        let url = GrainTexture::seeded(4, 6).to_data_url().unwrap();
        assert!(url.starts_with("data:image/png;base64,iVBOR"));
    }
}
