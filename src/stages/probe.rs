use crate::error::Error;
use crate::event::{Channel, StageContext, StageKind};
use crate::progress::ProgressSnapshot;
use crate::rational::Rational;
use crate::video::MediaInfo;

use super::process::ProcessHandle;
use super::{check_exit, finish, Stage};

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    display_aspect_ratio: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Reads geometry and timing of the first video stream with ffprobe.
pub struct Probe {
    ffprobe: PathBuf,
    process: ProcessHandle,
}

impl Probe {
    pub fn new(ffprobe: impl Into<PathBuf>) -> Self {
        Self { ffprobe: ffprobe.into(), process: ProcessHandle::new() }
    }

    fn command(&self, media_file: &Path) -> Command {
        let mut command = Command::new(&self.ffprobe);
        command
            .arg("-hide_banner")
            .arg("-i")
            .arg(media_file)
            .args([
                "-select_streams", "v:0",
                "-show_entries",
                concat!(
                    "format=duration:stream=duration,width,height,r_frame_rate,",
                    "display_aspect_ratio,sample_aspect_ratio",
                ),
                "-loglevel", "quiet",
                "-of", "json",
            ]);
        command
    }

    fn parse_duration(value: Option<&str>) -> Option<Duration> {
        let seconds = value?.trim().parse::<f64>().ok()?;
        (seconds.is_finite() && seconds > 0.0).then(|| Duration::from_secs_f64(seconds))
    }

    /// Parses the JSON document ffprobe printed.
    pub fn parse(json: &str) -> Result<MediaInfo, Error> {
        let output: ProbeOutput = serde_json::from_str(json)
            .map_err(|e| Error::Parse(format!("invalid ffprobe output: {}", e)))?;
        let stream = output
            .streams
            .first()
            .ok_or_else(|| Error::Parse("no video stream found".to_string()))?;

        let missing = |field: &str| Error::Parse(format!("video stream has no {}", field));
        let video_width = stream.width.ok_or_else(|| missing("width"))?;
        let video_height = stream.height.ok_or_else(|| missing("height"))?;
        let display_aspect_ratio = stream
            .display_aspect_ratio
            .as_deref()
            .ok_or_else(|| missing("display_aspect_ratio"))?;
        let frame_rate = stream
            .r_frame_rate
            .as_deref()
            .ok_or_else(|| missing("r_frame_rate"))?;

        let format_duration = output.format.as_ref().and_then(|f| f.duration.as_deref());
        let duration = Self::parse_duration(format_duration)
            .or_else(|| Self::parse_duration(stream.duration.as_deref()));

        Ok(MediaInfo {
            video_width,
            video_height,
            display_aspect_ratio: Rational::snap_aspect_ratio(Rational::parse(
                display_aspect_ratio,
            )?),
            frame_rate: Rational::parse(frame_rate)?,
            duration,
        })
    }

    fn execute(&self, media_file: &Path, context: &StageContext) -> Result<MediaInfo, Error> {
        let mut json = String::new();
        let command = self.command(media_file);
        let exit = self.process.run(command, context, |channel, line| match channel {
            Channel::Stdout => {
                json.push_str(&line);
                json.push('\n');
            }
            Channel::Stderr => context.log(Channel::Stderr, line),
        })?;
        check_exit("ffprobe", exit)?;
        Self::parse(&json)
    }
}

impl Stage for Probe {
    type Args = PathBuf;
    type Output = MediaInfo;

    fn kind(&self) -> StageKind {
        StageKind::Probe
    }

    fn run(&self, media_file: &PathBuf, context: &StageContext) -> Result<MediaInfo, Error> {
        let started = Instant::now();
        context.progress(ProgressSnapshot::started(Duration::ZERO));
        let result = self.execute(media_file, context);
        finish(context, started, &result);
        result
    }

    fn abort(&self) {
        self.process.kill();
    }
}
