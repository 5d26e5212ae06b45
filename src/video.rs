use crate::error::Error;
use crate::rational::Rational;

use std::time::Duration;

/// Geometry and timing of the first video stream of a source file.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaInfo {
    pub video_width: u32,
    pub video_height: u32,
    /// Already snapped to the nearest standard ratio.
    pub display_aspect_ratio: Rational,
    pub frame_rate: Rational,
    pub duration: Option<Duration>,
}

impl MediaInfo {
    pub fn estimated_frame_count(&self) -> Option<u64> {
        let duration = self.duration?;
        let frames = (self.frame_rate * duration.as_secs_f64()).round();
        (frames > 0.0).then_some(frames as u64)
    }
}

/// Output and intermediate frame sizes for one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub output_width: u32,
    pub output_height: u32,
    pub extract_width: u32,
    pub extract_height: u32,
    pub scale: u32,
}

impl Geometry {
    pub const DEFAULT_OUTPUT_HEIGHT: u32 = 1080;
    pub const MIN_OUTPUT_HEIGHT: u32 = 16;
    pub const MAX_OUTPUT_HEIGHT: u32 = 4320;

    pub fn derive(output_height: u32, aspect_ratio: Rational, scale: u32) -> Result<Self, Error> {
        if !(Self::MIN_OUTPUT_HEIGHT..=Self::MAX_OUTPUT_HEIGHT).contains(&output_height) {
            return Err(Error::InvalidArgument(format!(
                "output height must be between {} and {}, got {}",
                Self::MIN_OUTPUT_HEIGHT,
                Self::MAX_OUTPUT_HEIGHT,
                output_height
            )));
        }
        if scale == 0 {
            return Err(Error::InvalidArgument("scale must be greater than 0".to_string()));
        }

        let output_width = Self::output_width(output_height, aspect_ratio);
        Ok(Self {
            output_width,
            output_height,
            extract_width: output_width / scale,
            extract_height: output_height / scale,
            scale,
        })
    }

    pub fn from_media(media: &MediaInfo, output_height: u32, scale: u32) -> Result<Self, Error> {
        Self::derive(output_height, media.display_aspect_ratio, scale)
    }

    /// `height × ratio` rounded half away from zero, bumped to the next even value.
    pub fn output_width(height: u32, aspect_ratio: Rational) -> u32 {
        // Capped one below u32::MAX so the bump cannot overflow.
        let width = (height * aspect_ratio).round().min((u32::MAX - 1) as f64) as u32;
        if width % 2 == 0 { width } else { width + 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(duration: Option<Duration>) -> MediaInfo {
        MediaInfo {
            video_width: 720,
            video_height: 480,
            display_aspect_ratio: Rational::WIDESCREEN,
            frame_rate: Rational::new(24000, 1001).unwrap(),
            duration,
        }
    }

    #[test]
    fn widescreen_1080_needs_no_adjustment() {
        assert_eq!(Geometry::output_width(1080, Rational::WIDESCREEN), 1920);
    }

    #[test]
    fn odd_width_is_bumped_to_even() {
        // 1081 * 16/9 = 1921.78 -> 1922
        assert_eq!(Geometry::output_width(1081, Rational::WIDESCREEN), 1922);
        // 1081 * 4/3 = 1441.33 -> 1441 -> 1442
        assert_eq!(Geometry::output_width(1081, Rational::new(4, 3).unwrap()), 1442);
    }

    #[test]
    fn extraction_size_divides_by_scale() {
        let geometry = Geometry::derive(1080, Rational::WIDESCREEN, 2).unwrap();
        assert_eq!((geometry.output_width, geometry.output_height), (1920, 1080));
        assert_eq!((geometry.extract_width, geometry.extract_height), (960, 540));
    }

    #[test]
    fn zero_scale_is_rejected() {
        let rejected = |height, scale| {
            let geometry = Geometry::derive(height, Rational::WIDESCREEN, scale);
            matches!(geometry, Err(Error::InvalidArgument(_)))
        };
        assert!(rejected(1080, 0));
        assert!(rejected(0, 2));
    }

    #[test]
    fn height_outside_supported_range_is_rejected() {
        let rejected = |height| {
            let geometry = Geometry::derive(height, Rational::WIDESCREEN, 2);
            matches!(geometry, Err(Error::InvalidArgument(_)))
        };
        assert!(rejected(15));
        assert!(rejected(4321));
        assert_eq!(Geometry::derive(4320, Rational::WIDESCREEN, 2).unwrap().output_width, 7680);
    }

    #[test]
    fn huge_width_saturates_to_an_even_value() {
        assert_eq!(Geometry::output_width(u32::MAX, Rational::WIDESCREEN), u32::MAX - 1);
        let wide = Rational::new(u32::MAX, 1).unwrap();
        assert_eq!(Geometry::output_width(3, wide) % 2, 0);
    }

    #[test]
    fn frame_count_is_estimated_from_duration() {
        let info = media(Some(Duration::from_secs_f64(10.01)));
        assert_eq!(info.estimated_frame_count(), Some(240));
        assert_eq!(media(None).estimated_frame_count(), None);
        assert_eq!(media(Some(Duration::ZERO)).estimated_frame_count(), None);
    }
}
