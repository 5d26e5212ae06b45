use crate::error::Error;

use std::str::FromStr;

use serde::Deserialize;

/// Super-resolution models understood by waifu2x-ncnn-vulkan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpscaleModel {
    #[default]
    AnimeStyleArtRgb,
    Cunet,
    Photo,
}

impl UpscaleModel {
    pub const ALL: [UpscaleModel; 3] =
        [UpscaleModel::AnimeStyleArtRgb, UpscaleModel::Cunet, UpscaleModel::Photo];
    pub const DENOISE_LEVELS: std::ops::RangeInclusive<u32> = 0..=3;

    /// Model directory name passed to the upscaler with `-m`.
    pub fn id(&self) -> &'static str {
        match self {
            UpscaleModel::AnimeStyleArtRgb => "models-upconv_7_anime_style_art_rgb",
            UpscaleModel::Cunet => "models-cunet",
            UpscaleModel::Photo => "models-upconv_7_photo",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UpscaleModel::AnimeStyleArtRgb => "Anime Style Art RGB",
            UpscaleModel::Cunet => "CUnet",
            UpscaleModel::Photo => "Photo",
        }
    }

    pub fn scales(&self) -> &'static [u32] {
        match self {
            UpscaleModel::AnimeStyleArtRgb => &[2],
            UpscaleModel::Cunet => &[1, 2],
            UpscaleModel::Photo => &[2],
        }
    }

    pub fn validate(&self, scale: u32, denoise: u32) -> Result<(), Error> {
        if !self.scales().contains(&scale) {
            return Err(Error::InvalidArgument(format!(
                "{} does not support scale {}",
                self, scale
            )));
        }
        if !Self::DENOISE_LEVELS.contains(&denoise) {
            return Err(Error::InvalidArgument(format!(
                "denoise must be between 0 and 3, got {}",
                denoise
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for UpscaleModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpscaleModel::AnimeStyleArtRgb => write!(f, "anime-style-art-rgb"),
            UpscaleModel::Cunet => write!(f, "cunet"),
            UpscaleModel::Photo => write!(f, "photo"),
        }
    }
}

impl FromStr for UpscaleModel {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|model| model.to_string() == name || model.id() == name)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown model: {}", name)))
    }
}
