use std::fmt;

/// Pipeline stage named in shader diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Fatal renderer failures. Every variant terminates the session; there is
/// no retry path and no degraded rendering mode.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unsupported rendering surface: {0}")]
    UnsupportedSurface(String),
    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    #[error("shader program failed to link: {log}")]
    ShaderLink { log: String },
    #[error("uniform `{name}` is not present in the generated program")]
    MissingUniform { name: String },
    #[error("invalid wave count {0}; the field needs at least one wave")]
    InvalidWaveCount(usize),
    #[error("invalid colour count {0}; a gradient needs at least two stops")]
    InvalidColourCount(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_errors_name_their_stage() {
        let error = RenderError::ShaderCompile {
            stage: ShaderStage::Fragment,
            log: "unexpected token".into(),
        };
        assert_eq!(
            error.to_string(),
            "fragment shader failed to compile: unexpected token"
        );
    }

    #[test]
    fn missing_uniform_names_the_handle() {
        let error = RenderError::MissingUniform {
            name: "resolution".into(),
        };
        assert!(error.to_string().contains("`resolution`"));
    }
}
