use std::path::PathBuf;

use clap::Parser;
use renderer::Colour;
use scheduler::DeviceClass;

use crate::config::parse_device_class;

#[derive(Parser, Debug)]
#[command(
    name = "wavepaper",
    author,
    version,
    about = "Animated wave-gradient desktop background",
    arg_required_else_help = false
)]
pub struct Args {
    /// Gradient stop as a hex colour (repeat the flag for each stop, top to bottom).
    #[arg(long = "colour", value_name = "HEX", value_parser = parse_colour)]
    pub colours: Vec<Colour>,

    /// Configuration file; defaults to `config.toml` in the user config directory.
    #[arg(long, value_name = "PATH", env = "WAVEPAPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the window size (e.g. `1200x900`).
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,

    /// Wave-field seed; the same seed reproduces the same background.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Divisor between the window and the gradient render target.
    #[arg(long, value_name = "FACTOR")]
    pub downscale: Option<u32>,

    /// Edge length of the generated grain tile in pixels.
    #[arg(long, value_name = "PIXELS")]
    pub grain_size: Option<u32>,

    /// Power probing profile: `desktop` or `handheld`.
    #[arg(long, value_name = "CLASS", value_parser = parse_device_class)]
    pub device_class: Option<DeviceClass>,
}

pub fn parse() -> Args {
    Args::parse()
}

pub fn parse_colour(value: &str) -> Result<Colour, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("colour must not be empty".to_string());
    }
    Colour::from_hex(trimmed).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_flags_accumulate_in_order() {
        let args = Args::try_parse_from([
            "wavepaper",
            "--colour",
            "#102030",
            "--colour",
            "#405060",
        ])
        .expect("parse args");
        assert_eq!(
            args.colours,
            vec![Colour::new(0x10, 0x20, 0x30), Colour::new(0x40, 0x50, 0x60)]
        );
    }

    #[test]
    fn malformed_colours_are_rejected_at_the_flag() {
        assert!(Args::try_parse_from(["wavepaper", "--colour", "teal"]).is_err());
        assert!(parse_colour("").is_err());
        assert!(parse_colour("a3e8ff").is_err());
    }

    #[test]
    fn device_class_flag_maps_to_the_probe_branch() {
        let args = Args::try_parse_from(["wavepaper", "--device-class", "handheld"])
            .expect("parse args");
        assert_eq!(args.device_class, Some(DeviceClass::Handheld));
    }
}
