use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories_next::ProjectDirs;
use renderer::{Palette, Renderer, RendererConfig, DEFAULT_DOWNSCALE, DEFAULT_GRAIN_SIZE};
use scheduler::power::{DEFAULT_PROBE_DELAY, DEFAULT_PROBE_INTERVAL};
use tracing_subscriber::EnvFilter;

use crate::cli::Args;
use crate::config::FileConfig;
use crate::defaults;

const CONFIG_FILE_NAME: &str = "config.toml";

pub fn run(args: Args) -> Result<()> {
    initialise_tracing();

    let file = load_config(&args)?;
    let config = merge(&args, &file)?;
    tracing::info!(
        size = ?config.window_size,
        seed = config.wave_seed,
        stops = config.palette.stop_count(),
        downscale = config.downscale,
        "starting wavepaper"
    );
    Renderer::new(config).run()
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// An explicit `--config` path must exist; the well-known per-user path is
/// optional and silently skipped when absent.
fn load_config(args: &Args) -> Result<FileConfig> {
    let path = match args.config.clone() {
        Some(path) => path,
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(FileConfig::default()),
        },
    };

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = FileConfig::from_toml_str(&contents)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "wavepaper")?;
    Some(project_dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn merge(args: &Args, file: &FileConfig) -> Result<RendererConfig> {
    let stops = if !args.colours.is_empty() {
        args.colours.clone()
    } else if let Some(stops) = &file.palette.stops {
        stops.clone()
    } else {
        defaults::BASE_PALETTE.to_vec()
    };
    let palette = Palette::new(stops).context("invalid gradient palette")?;

    let window_size = match args.size.as_deref() {
        Some(raw) => parse_surface_size(raw)?,
        None => file
            .render
            .size
            .map(|[width, height]| (width, height))
            .unwrap_or(defaults::WINDOW_SIZE),
    };

    Ok(RendererConfig {
        window_size,
        palette,
        wave_seed: args
            .seed
            .or(file.render.seed)
            .unwrap_or(defaults::WAVE_SEED),
        downscale: args
            .downscale
            .or(file.render.downscale)
            .unwrap_or(DEFAULT_DOWNSCALE),
        grain_size: args
            .grain_size
            .or(file.render.grain_size)
            .unwrap_or(DEFAULT_GRAIN_SIZE),
        device_class: args
            .device_class
            .or(file.power.device_class)
            .unwrap_or_default(),
        probe_delay: file.power.probe_delay.unwrap_or(DEFAULT_PROBE_DELAY),
        probe_interval: file.power.probe_interval.unwrap_or(DEFAULT_PROBE_INTERVAL),
    })
}

fn parse_surface_size(spec: &str) -> Result<(u32, u32)> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow::anyhow!("expected WxH format, e.g. 1200x900"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid width in size specification"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid height in size specification"))?;

    if width == 0 || height == 0 {
        anyhow::bail!("surface dimensions must be greater than zero");
    }

    Ok((width, height))
}
