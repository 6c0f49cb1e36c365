//! Generation of the gradient shader pair.
//!
//! Array lengths cannot be uniforms, so the fragment stage is templated at
//! session-build time with the wave and colour counts compiled into the
//! source. A palette with a different stop count therefore needs a fresh
//! template and a full pipeline rebuild, not a uniform update.

use std::collections::BTreeMap;

use crate::error::RenderError;

/// std140 stride of one wave struct (three floats, then a vec2 aligned to
/// 8, rounded up to the 16-byte struct alignment).
const WAVE_STRIDE: usize = 32;

/// std140 stride of one vec3 colour stop.
const COLOUR_STRIDE: usize = 16;

/// Offset of the wave array; `resolution` (vec2) and `max_intensity`
/// (float) pad out to one 16-byte slot.
const WAVES_BASE: usize = 16;

const VERTEX_SOURCE: &str = r"#version 450

layout(location = 0) in vec2 a_position;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = a_position * 0.5 + 0.5;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

const FRAGMENT_PRELUDE: &str = r"#version 450

layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_colour;

const float TWO_PI = 6.28318530;
const float INV_ROOT_3 = 0.57735026;
const vec3 HUE_AXIS = vec3(INV_ROOT_3);

struct Wave {
    float intensity;
    float frequency;
    float offset;
    vec2 components;
};

";

const FRAGMENT_BODY: &str = r"
float normalise_sin(float value) {
    return (sin(value) + 1.0) * 0.5;
}

vec3 intensity_to_gradient(float t) {
    float lerp = mod(t, COLOUR_SEGMENT) / COLOUR_SEGMENT;
    for (int i = 0; i < COLOUR_COUNT - 1; i++) {
        if (int(t / COLOUR_SEGMENT) <= i) {
            return mix(ubo.colours[i], ubo.colours[i + 1], lerp);
        }
    }
    return ubo.colours[COLOUR_COUNT - 1];
}

vec3 hue_shift(vec3 colour, float shift) {
    float cos_shift = cos(shift);
    float sin_shift = sin(shift);
    return colour * cos_shift
        + cross(HUE_AXIS, colour) * sin_shift
        + HUE_AXIS * dot(HUE_AXIS, colour) * (1.0 - cos_shift);
}

void main() {
    vec2 coord = v_uv * ubo.resolution;
    float max_scale = max(ubo.resolution.x, ubo.resolution.y);
    float sum = 0.0;
    for (int i = 0; i < WAVE_COUNT; i++) {
        Wave wave = ubo.waves[i];
        float magnitude = dot(coord, wave.components);
        sum += wave.intensity
            * normalise_sin((magnitude * wave.frequency / max_scale + wave.offset) * TWO_PI);
    }
    vec3 gradient = intensity_to_gradient(sum / ubo.max_intensity);
    float shift = mod(
        (coord.x + ubo.resolution.y - coord.y) * 0.4 * TWO_PI
            / (ubo.resolution.x + ubo.resolution.y),
        TWO_PI);
    out_colour = vec4(hue_shift(gradient, shift), 1.0);
}
";

/// Shape of a generated gradient shader: how many waves feed the field and
/// how many colour stops the gradient walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderTemplate {
    wave_count: usize,
    colour_count: usize,
}

impl ShaderTemplate {
    pub fn new(wave_count: usize, colour_count: usize) -> Result<Self, RenderError> {
        if wave_count == 0 {
            return Err(RenderError::InvalidWaveCount(wave_count));
        }
        if colour_count < 2 {
            return Err(RenderError::InvalidColourCount(colour_count));
        }
        Ok(Self {
            wave_count,
            colour_count,
        })
    }

    pub fn wave_count(&self) -> usize {
        self.wave_count
    }

    pub fn colour_count(&self) -> usize {
        self.colour_count
    }

    /// The static vertex stage: a full-screen quad whose clip coordinates
    /// map to `[0, 1]` UVs.
    pub fn vertex_source(&self) -> &'static str {
        VERTEX_SOURCE
    }

    fn colour_segment(&self) -> f32 {
        1.0 / (self.colour_count - 1) as f32
    }

    /// Generates the fragment stage with the counts baked into constants
    /// and array lengths.
    pub fn fragment_source(&self) -> String {
        let mut source = String::with_capacity(FRAGMENT_PRELUDE.len() + FRAGMENT_BODY.len() + 512);
        source.push_str(FRAGMENT_PRELUDE);
        source.push_str(&format!("const int WAVE_COUNT = {};\n", self.wave_count));
        source.push_str(&format!("const int COLOUR_COUNT = {};\n", self.colour_count));
        source.push_str(&format!(
            "const float COLOUR_SEGMENT = {:?};\n\n",
            self.colour_segment()
        ));
        source.push_str("layout(std140, set = 0, binding = 0) uniform GradientParams {\n");
        source.push_str("    vec2 resolution;\n");
        source.push_str("    float max_intensity;\n");
        source.push_str(&format!("    Wave waves[{}];\n", self.wave_count));
        source.push_str(&format!("    vec3 colours[{}];\n", self.colour_count));
        source.push_str("} ubo;\n");
        source.push_str(FRAGMENT_BODY);
        source
    }

    /// Byte layout of the `GradientParams` block the fragment stage
    /// declares.
    pub fn uniform_layout(&self) -> UniformLayout {
        UniformLayout::new(self.wave_count, self.colour_count)
    }
}

/// std140 byte offsets of every uniform in the generated block, keyed by
/// the names the renderer writes each frame.
#[derive(Debug, Clone)]
pub struct UniformLayout {
    size: usize,
    offsets: BTreeMap<String, usize>,
}

impl UniformLayout {
    fn new(wave_count: usize, colour_count: usize) -> Self {
        let mut offsets = BTreeMap::new();
        offsets.insert("resolution".to_owned(), 0);
        offsets.insert("max_intensity".to_owned(), 8);
        for index in 0..wave_count {
            let base = WAVES_BASE + index * WAVE_STRIDE;
            offsets.insert(format!("waves[{index}].intensity"), base);
            offsets.insert(format!("waves[{index}].frequency"), base + 4);
            offsets.insert(format!("waves[{index}].offset"), base + 8);
            offsets.insert(format!("waves[{index}].components"), base + 16);
        }
        let colours_base = WAVES_BASE + wave_count * WAVE_STRIDE;
        for index in 0..colour_count {
            offsets.insert(
                format!("colours[{index}]"),
                colours_base + index * COLOUR_STRIDE,
            );
        }
        Self {
            size: colours_base + colour_count * COLOUR_STRIDE,
            offsets,
        }
    }

    /// Total block size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Byte offset of a named uniform; unknown names fail so a session can
    /// resolve every location up front instead of discovering a hole
    /// mid-frame.
    pub fn offset(&self, name: &str) -> Result<usize, RenderError> {
        self.offsets
            .get(name)
            .copied()
            .ok_or_else(|| RenderError::MissingUniform {
                name: name.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_rejects_degenerate_counts() {
        assert!(matches!(
            ShaderTemplate::new(0, 4),
            Err(RenderError::InvalidWaveCount(0))
        ));
        assert!(matches!(
            ShaderTemplate::new(6, 1),
            Err(RenderError::InvalidColourCount(1))
        ));
    }

    #[test]
    fn fragment_source_bakes_the_counts_in() {
        let source = ShaderTemplate::new(6, 4).unwrap().fragment_source();
        assert!(source.contains("const int WAVE_COUNT = 6;"));
        assert!(source.contains("const int COLOUR_COUNT = 4;"));
        assert!(source.contains("Wave waves[6];"));
        assert!(source.contains("vec3 colours[4];"));
        assert!(source.contains("const float COLOUR_SEGMENT = 0.33333334;"));
    }

    #[test]
    fn two_stop_gradient_spans_the_whole_range() {
        let source = ShaderTemplate::new(1, 2).unwrap().fragment_source();
        assert!(source.contains("const float COLOUR_SEGMENT = 1.0;"));
    }

    #[test]
    fn fragment_source_carries_the_post_process() {
        let source = ShaderTemplate::new(6, 4).unwrap().fragment_source();
        assert!(source.contains("hue_shift(gradient, shift)"));
        assert!(source.contains("cross(HUE_AXIS, colour)"));
    }

    #[test]
    fn vertex_stage_maps_clip_space_to_uv() {
        let template = ShaderTemplate::new(6, 4).unwrap();
        assert!(template.vertex_source().contains("a_position * 0.5 + 0.5"));
    }

    #[test]
    fn layout_follows_std140_strides() {
        let layout = ShaderTemplate::new(6, 4).unwrap().uniform_layout();
        assert_eq!(layout.offset("resolution").unwrap(), 0);
        assert_eq!(layout.offset("max_intensity").unwrap(), 8);
        assert_eq!(layout.offset("waves[0].intensity").unwrap(), 16);
        assert_eq!(layout.offset("waves[0].components").unwrap(), 32);
        assert_eq!(layout.offset("waves[1].intensity").unwrap(), 48);
        assert_eq!(layout.offset("waves[5].offset").unwrap(), 16 + 5 * 32 + 8);
        assert_eq!(layout.offset("colours[0]").unwrap(), 208);
        assert_eq!(layout.offset("colours[3]").unwrap(), 256);
        assert_eq!(layout.size(), 272);
    }

    #[test]
    fn unknown_uniforms_fail_resolution() {
        let layout = ShaderTemplate::new(2, 2).unwrap().uniform_layout();
        assert!(matches!(
            layout.offset("waves[2].intensity"),
            Err(RenderError::MissingUniform { name }) if name == "waves[2].intensity"
        ));
    }
}
