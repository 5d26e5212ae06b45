use crate::error::Error;
use crate::model::UpscaleModel;
use crate::stages::CodecParams;
use crate::video::Geometry;

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Locations of the external tools. These are used as given, never searched for.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
    pub waifu2x: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffprobe: PathBuf::from("ffprobe"),
            ffmpeg: PathBuf::from("ffmpeg"),
            waifu2x: PathBuf::from("waifu2x-ncnn-vulkan"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolPaths,
    /// Height of the final video in pixels
    pub output_height: u32,
    pub scale: u32,
    pub denoise: u32,
    pub model: UpscaleModel,
    pub codecs: CodecParams,
    /// Directory for intermediate frames; next to the input file when unset
    pub work_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            output_height: Geometry::DEFAULT_OUTPUT_HEIGHT,
            scale: 2,
            denoise: 0,
            model: UpscaleModel::default(),
            codecs: CodecParams::default(),
            work_root: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, or return defaults if no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let heights = Geometry::MIN_OUTPUT_HEIGHT..=Geometry::MAX_OUTPUT_HEIGHT;
        if !heights.contains(&self.output_height) {
            return Err(Error::Config(format!(
                "output_height must be between {} and {}, got {}",
                Geometry::MIN_OUTPUT_HEIGHT,
                Geometry::MAX_OUTPUT_HEIGHT,
                self.output_height
            )));
        }
        self.model
            .validate(self.scale, self.denoise)
            .map_err(|e| Error::Config(e.to_string()))
    }
}
