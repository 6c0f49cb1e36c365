//! On-disk configuration: a TOML file with optional `[palette]`, `[render]`
//! and `[power]` tables. Every field is optional; the command line wins over
//! the file, and the file wins over built-in defaults.

use std::fmt;
use std::time::Duration;

use renderer::Colour;
use scheduler::DeviceClass;
use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub palette: PaletteSection,
    #[serde(default)]
    pub render: RenderSection,
    #[serde(default)]
    pub power: PowerSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaletteSection {
    /// Gradient stops as hex colours, top of the window first.
    #[serde(default, deserialize_with = "deserialize_colours_opt")]
    pub stops: Option<Vec<Colour>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RenderSection {
    pub size: Option<[u32; 2]>,
    pub seed: Option<u64>,
    pub downscale: Option<u32>,
    pub grain_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PowerSection {
    #[serde(default, deserialize_with = "deserialize_device_class_opt")]
    pub device_class: Option<DeviceClass>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub probe_delay: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub probe_interval: Option<Duration>,
}

impl FileConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FileConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(stops) = &self.palette.stops {
            if stops.len() < 2 {
                return Err(ConfigError::Invalid(
                    "palette must define at least two stops".into(),
                ));
            }
        }

        if let Some([width, height]) = self.render.size {
            if width == 0 || height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "render size {width}x{height} must be non-zero"
                )));
            }
        }

        if self.render.downscale == Some(0) {
            return Err(ConfigError::Invalid("downscale must be at least 1".into()));
        }

        if self.render.grain_size == Some(0) {
            return Err(ConfigError::Invalid("grain_size must be at least 1".into()));
        }

        if self.power.probe_interval == Some(Duration::ZERO) {
            return Err(ConfigError::Invalid(
                "probe_interval must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

pub fn parse_device_class(value: &str) -> Result<DeviceClass, String> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "desktop" => Ok(DeviceClass::Desktop),
        "handheld" | "mobile" => Ok(DeviceClass::Handheld),
        other => Err(format!(
            "unknown device class '{other}'; expected desktop or handheld"
        )),
    }
}

fn deserialize_colours_opt<'de, D>(deserializer: D) -> Result<Option<Vec<Colour>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(values) => values
            .iter()
            .map(|value| Colour::from_hex(value).map_err(de::Error::custom))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
    }
}

fn deserialize_device_class_opt<'de, D>(deserializer: D) -> Result<Option<DeviceClass>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(value) => parse_device_class(&value)
            .map(Some)
            .map_err(de::Error::custom),
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
[palette]
stops = ["#a3e8ff", "#ece5ff", "#ffd6e2", "#ffb8c9"]

[render]
size = [1600, 1000]
seed = 7
downscale = 2
grain_size = 256

[power]
device_class = "handheld"
probe_delay = "2s"
probe_interval = 45
"##;

    #[test]
    fn parses_sample_config() {
        let config = FileConfig::from_toml_str(SAMPLE).expect("parse config");
        let stops = config.palette.stops.expect("palette stops");
        assert_eq!(stops.len(), 4);
        assert_eq!(stops[0], Colour::new(163, 232, 255));
        assert_eq!(config.render.size, Some([1600, 1000]));
        assert_eq!(config.render.seed, Some(7));
        assert_eq!(config.render.downscale, Some(2));
        assert_eq!(config.render.grain_size, Some(256));
        assert_eq!(config.power.device_class, Some(DeviceClass::Handheld));
        assert_eq!(config.power.probe_delay, Some(Duration::from_secs(2)));
        assert_eq!(config.power.probe_interval, Some(Duration::from_secs(45)));
    }

    #[test]
    fn empty_input_leaves_every_field_unset() {
        let config = FileConfig::from_toml_str("").expect("parse empty config");
        assert!(config.palette.stops.is_none());
        assert!(config.render.size.is_none());
        assert!(config.render.seed.is_none());
        assert!(config.power.device_class.is_none());
        assert!(config.power.probe_delay.is_none());
    }

    #[test]
    fn durations_accept_fractional_seconds() {
        let config =
            FileConfig::from_toml_str("[power]\nprobe_delay = 1.5\n").expect("parse config");
        assert_eq!(config.power.probe_delay, Some(Duration::from_secs_f64(1.5)));
    }

    #[test]
    fn durations_accept_humantime_strings() {
        let config =
            FileConfig::from_toml_str("[power]\nprobe_interval = \"1m 30s\"\n").expect("parse");
        assert_eq!(config.power.probe_interval, Some(Duration::from_secs(90)));
    }

    #[test]
    fn rejects_a_single_palette_stop() {
        let err = FileConfig::from_toml_str("[palette]\nstops = [\"#a3e8ff\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_palette_stops() {
        let err =
            FileConfig::from_toml_str("[palette]\nstops = [\"#a3e8ff\", \"blue\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_zero_downscale() {
        let err = FileConfig::from_toml_str("[render]\ndownscale = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_probe_interval() {
        let err = FileConfig::from_toml_str("[power]\nprobe_interval = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_device_class() {
        let err = FileConfig::from_toml_str("[power]\ndevice_class = \"toaster\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn device_class_parsing_is_case_insensitive() {
        assert_eq!(parse_device_class("Desktop"), Ok(DeviceClass::Desktop));
        assert_eq!(parse_device_class(" HANDHELD "), Ok(DeviceClass::Handheld));
        assert_eq!(parse_device_class("mobile"), Ok(DeviceClass::Handheld));
        assert!(parse_device_class("laptop").is_err());
    }
}
