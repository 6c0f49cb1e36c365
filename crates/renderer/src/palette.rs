//! Colour stops and the CPU mirror of the shader's gradient lookup.

use crate::error::RenderError;

/// An 8-bit sRGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("malformed colour `{0}`; expected `#rrggbb`")]
pub struct ColourParseError(pub String);

impl Colour {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses a `#rrggbb` string. The leading `#` is required.
    pub fn from_hex(hex: &str) -> Result<Self, ColourParseError> {
        let malformed = || ColourParseError(hex.to_owned());
        let digits = hex.strip_prefix('#').ok_or_else(malformed)?;
        if digits.len() != 6 || !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
            return Err(malformed());
        }
        let channel = |index: usize| {
            u8::from_str_radix(&digits[index * 2..index * 2 + 2], 16).map_err(|_| malformed())
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(1)?,
            b: channel(2)?,
        })
    }

    /// Formats as lower-case `#rrggbb`; round-trips through [`from_hex`].
    ///
    /// [`from_hex`]: Colour::from_hex
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Channels scaled by 1/256, the range the gradient uploads.
    pub fn normalised(&self) -> [f32; 3] {
        [
            f32::from(self.r) / 256.0,
            f32::from(self.g) / 256.0,
            f32::from(self.b) / 256.0,
        ]
    }
}

/// An ordered list of gradient stops. Construction enforces the two-stop
/// minimum; the stop count is compiled into the shader source, so a list
/// with a different length needs a fresh session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    stops: Vec<Colour>,
}

impl Palette {
    pub fn new(stops: Vec<Colour>) -> Result<Self, RenderError> {
        if stops.len() < 2 {
            return Err(RenderError::InvalidColourCount(stops.len()));
        }
        Ok(Self { stops })
    }

    pub fn stops(&self) -> &[Colour] {
        &self.stops
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    /// Piecewise-linear gradient over the normalised stops, mirroring the
    /// shader's lookup exactly: the unit range splits into `stops - 1` equal
    /// segments, a boundary value returns its stop with no blending, and
    /// anything at or past the final boundary clamps to the last stop.
    pub fn sample(&self, t: f32) -> [f32; 3] {
        let segment = 1.0 / (self.stops.len() - 1) as f32;
        let lerp = t.rem_euclid(segment) / segment;
        for index in 0..self.stops.len() - 1 {
            if (t / segment) as i32 <= index as i32 {
                let from = self.stops[index].normalised();
                let to = self.stops[index + 1].normalised();
                return [
                    from[0] + (to[0] - from[0]) * lerp,
                    from[1] + (to[1] - from[1]) * lerp,
                    from[2] + (to[2] - from[2]) * lerp,
                ];
            }
        }
        self.stops[self.stops.len() - 1].normalised()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greyscale(values: &[u8]) -> Palette {
        Palette::new(values.iter().map(|&v| Colour::new(v, v, v)).collect()).unwrap()
    }

    #[test]
    fn hex_round_trips() {
        for colour in [
            Colour::new(0, 0, 0),
            Colour::new(255, 255, 255),
            Colour::new(163, 232, 255),
            Colour::new(1, 2, 3),
        ] {
            assert_eq!(Colour::from_hex(&colour.to_hex()).unwrap(), colour);
        }
    }

    #[test]
    fn hex_output_is_lower_case_with_hash() {
        assert_eq!(Colour::new(255, 184, 201).to_hex(), "#ffb8c9");
    }

    #[test]
    fn hex_accepts_upper_case_input() {
        assert_eq!(
            Colour::from_hex("#A3E8FF").unwrap(),
            Colour::new(163, 232, 255)
        );
    }

    #[test]
    fn hex_rejects_malformed_input() {
        for bad in ["a3e8ff", "#a3e8f", "#a3e8ff0", "#a3e8fg", "#", ""] {
            assert!(Colour::from_hex(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn normalised_divides_by_256() {
        assert_eq!(
            Colour::new(255, 0, 128).normalised(),
            [255.0 / 256.0, 0.0, 0.5]
        );
    }

    #[test]
    fn palette_rejects_fewer_than_two_stops() {
        assert!(matches!(
            Palette::new(vec![Colour::new(0, 0, 0)]),
            Err(RenderError::InvalidColourCount(1))
        ));
    }

    #[test]
    fn boundary_values_return_their_stop_exactly() {
        let palette = greyscale(&[0, 128, 255]);
        assert_eq!(palette.sample(0.0), Colour::new(0, 0, 0).normalised());
        assert_eq!(palette.sample(0.5), Colour::new(128, 128, 128).normalised());
        assert_eq!(palette.sample(1.0), Colour::new(255, 255, 255).normalised());
    }

    #[test]
    fn values_past_the_end_clamp_to_the_final_stop() {
        let palette = greyscale(&[0, 255]);
        assert_eq!(palette.sample(1.5), Colour::new(255, 255, 255).normalised());
    }

    #[test]
    fn interpolation_is_linear_within_a_segment() {
        let palette = greyscale(&[0, 255]);
        let quarter = palette.sample(0.25)[0];
        assert!((quarter - 0.25 * (255.0 / 256.0)).abs() < 1e-6);
    }

    #[test]
    fn interpolation_is_continuous_across_a_boundary() {
        let palette = greyscale(&[10, 200, 60]);
        let epsilon = 1e-4;
        let below = palette.sample(0.5 - epsilon);
        let above = palette.sample(0.5 + epsilon);
        for channel in 0..3 {
            assert!((below[channel] - above[channel]).abs() < 0.01);
        }
    }
}
