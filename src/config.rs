use std::f32::consts::FRAC_PI_2;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use gfx::CameraConfig;
use serde::Deserialize;
use voxel::RendererConfig;
use world_gen::TerrainKind;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Voxel terrain renderer", long_about = None)]
pub struct Args
{
    /// TOML file to read settings from
    #[arg(long, default_value = "hexane.toml")]
    pub config: PathBuf,

    /// Render without a window
    #[arg(long)]
    pub headless: bool,

    /// Frames to render in headless mode
    #[arg(long, default_value_t = 16)]
    pub frames: u32,

    /// Write the last headless frame to this PNG
    #[arg(long)]
    pub screenshot: Option<PathBuf>,

    #[arg(long, short = 'W', default_value_t = 1280)]
    pub width: u32,

    #[arg(long, short = 'H', default_value_t = 720)]
    pub height: u32,

    /// Overrides the terrain seed of the config file
    #[arg(long)]
    pub seed: Option<u32>
}

/// Data as parsed directly out of the config file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig
{
    pub workspace_chunks:  Option<u32>,
    pub volume_chunks:     Option<[u32; 3]>,
    pub heap_bytes:        Option<u32>,
    pub region_capacity:   Option<u32>,
    pub seed:              Option<u32>,
    pub max_retry_backoff: Option<u32>,
    pub terrain:           Option<RawTerrain>,
    #[serde(default)]
    pub camera:            RawCameraConfig
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawTerrain
{
    Hills
    {
        base_height: f64,
        amplitude:   f64,
        frequency:   f64
    },
    Flat
    {
        height: i32
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCameraConfig
{
    pub speed:          Option<f32>,
    pub sensitivity:    Option<f32>,
    pub fov_y_degrees:  Option<f32>,
    pub near:           Option<f32>,
    pub far:            Option<f32>,
    pub start_position: Option<[f32; 3]>,
    pub yaw_degrees:    Option<f32>,
    pub pitch_degrees:  Option<f32>
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config
{
    pub renderer:          RendererConfig,
    pub camera:            CameraConfig,
    /// Initial (yaw, pitch) in radians.
    pub start_orientation: (f32, f32),
    pub headless:          bool,
    pub frames:            u32,
    pub screenshot:        Option<PathBuf>,
    pub width:             u32,
    pub height:            u32
}

impl Config
{
    pub fn load(args: &Args) -> anyhow::Result<Config>
    {
        let raw = read_raw_config(&args.config)?;

        Config::from_raw(&raw, args)
    }

    pub fn from_raw(raw: &RawConfig, args: &Args) -> anyhow::Result<Config>
    {
        let defaults = RendererConfig::default();

        let renderer = RendererConfig {
            workspace_chunks:  raw.workspace_chunks.unwrap_or(defaults.workspace_chunks),
            volume_chunks:     raw.volume_chunks.unwrap_or(defaults.volume_chunks),
            heap_bytes:        raw.heap_bytes.unwrap_or(defaults.heap_bytes),
            region_capacity:   raw.region_capacity.unwrap_or(defaults.region_capacity),
            seed:              args.seed.or(raw.seed).unwrap_or(defaults.seed),
            terrain:           raw.terrain.map_or(defaults.terrain, TerrainKind::from),
            max_retry_backoff: raw.max_retry_backoff.unwrap_or(defaults.max_retry_backoff)
        };

        renderer.validate().context("invalid renderer config")?;

        let camera_defaults = CameraConfig::default();
        let c = &raw.camera;

        let camera = CameraConfig {
            speed:          c.speed.unwrap_or(camera_defaults.speed),
            sensitivity:    c.sensitivity.unwrap_or(camera_defaults.sensitivity),
            fov_y_radians:  c
                .fov_y_degrees
                .map_or(camera_defaults.fov_y_radians, f32::to_radians),
            near:           c.near.unwrap_or(camera_defaults.near),
            far:            c.far.unwrap_or(camera_defaults.far),
            start_position: c.start_position.unwrap_or(camera_defaults.start_position)
        };

        if !(camera.near > 0.0 && camera.far > camera.near)
        {
            anyhow::bail!(
                "camera clip planes must satisfy 0 < near < far, got near {} far {}",
                camera.near,
                camera.far
            );
        }

        Ok(Config {
            renderer,
            camera,
            start_orientation: (
                c.yaw_degrees.map_or(0.0, f32::to_radians),
                c.pitch_degrees.map_or(FRAC_PI_2 * 0.7, f32::to_radians)
            ),
            headless:          args.headless,
            frames:            args.frames,
            screenshot:        args.screenshot.clone(),
            width:             args.width,
            height:            args.height
        })
    }
}

impl From<RawTerrain> for TerrainKind
{
    fn from(raw: RawTerrain) -> Self
    {
        match raw
        {
            RawTerrain::Hills {
                base_height,
                amplitude,
                frequency
            } =>
            {
                TerrainKind::Hills {
                    base_height,
                    amplitude,
                    frequency
                }
            }
            RawTerrain::Flat {
                height
            } =>
            {
                TerrainKind::Flat {
                    height
                }
            }
        }
    }
}

fn read_raw_config(path: &Path) -> anyhow::Result<RawConfig>
{
    match std::fs::read_to_string(path)
    {
        Ok(data) =>
        {
            log::info!("Found config at {}", path.display());

            toml::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound =>
        {
            log::info!("{} not found, using defaults", path.display());

            Ok(RawConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display()))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn args(extra: &[&str]) -> Args
    {
        Args::parse_from(std::iter::once("hexane").chain(extra.iter().copied()))
    }

    #[test]
    fn empty_file_resolves_to_defaults()
    {
        let raw: RawConfig = toml::from_str("").unwrap();
        let config = Config::from_raw(&raw, &args(&[])).unwrap();

        assert_eq!(config.renderer, RendererConfig::default());
        assert_eq!(config.camera, CameraConfig::default());
        assert!(!config.headless);
        assert_eq!((config.width, config.height), (1280, 720));
    }

    #[test]
    fn file_values_and_overrides()
    {
        let raw: RawConfig = toml::from_str(
            r#"
            workspace_chunks = 1
            volume_chunks = [4, 4, 2]
            seed = 7

            [terrain]
            kind = "flat"
            height = 12

            [camera]
            speed = 4.0
            fov_y_degrees = 90.0
            "#
        )
        .unwrap();

        let config =
            Config::from_raw(&raw, &args(&["--headless", "--seed", "9", "--frames", "3"])).unwrap();

        assert_eq!(config.renderer.workspace_chunks, 1);
        assert_eq!(config.renderer.volume_chunks, [4, 4, 2]);
        assert_eq!(config.renderer.seed, 9);
        assert_eq!(config.renderer.terrain, TerrainKind::Flat {
            height: 12
        });
        assert_eq!(config.camera.speed, 4.0);
        assert!((config.camera.fov_y_radians - FRAC_PI_2).abs() < 1e-6);
        assert!(config.headless);
        assert_eq!(config.frames, 3);
    }

    #[test]
    fn unknown_keys_are_rejected()
    {
        assert!(toml::from_str::<RawConfig>("workspace_chunkz = 2").is_err());
        assert!(toml::from_str::<RawConfig>("[camera]\nzoom = 2.0").is_err());
    }

    #[test]
    fn invalid_values_are_rejected()
    {
        let raw: RawConfig = toml::from_str("workspace_chunks = 0").unwrap();
        assert!(Config::from_raw(&raw, &args(&[])).is_err());

        let raw: RawConfig = toml::from_str("workspace_chunks = 1000").unwrap();
        assert!(Config::from_raw(&raw, &args(&[])).is_err());

        let raw: RawConfig = toml::from_str("[camera]\nnear = 10.0\nfar = 1.0").unwrap();
        assert!(Config::from_raw(&raw, &args(&[])).is_err());
    }

    #[test]
    fn missing_file_means_defaults()
    {
        let raw = read_raw_config(Path::new("this/path/does/not/exist.toml")).unwrap();

        assert!(raw.workspace_chunks.is_none());
    }
}
