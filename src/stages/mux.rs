use crate::error::Error;
use crate::event::{Channel, StageContext, StageKind};
use crate::progress::ProgressSnapshot;
use crate::rational::Rational;

use super::ffmpeg_output;
use super::process::ProcessHandle;
use super::{check_exit, count_frames, finish, Stage, FRAME_PATTERN};

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use serde::Deserialize;

/// Encoder settings for the final container.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CodecParams {
    pub subtitle_codec: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub video_codec: String,
    pub video_crf: u32,
    /// Left out of the command line when empty
    pub video_preset: String,
    /// Left out of the command line when empty
    pub video_tuning: String,
}

impl Default for CodecParams {
    fn default() -> Self {
        Self {
            subtitle_codec: String::from("copy"),
            audio_codec: String::from("copy"),
            audio_bitrate: String::from("192k"),
            video_codec: String::from("libx264"),
            video_crf: 20,
            video_preset: String::from("slow"),
            video_tuning: String::from("animation"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MuxArgs {
    /// Source of the audio and subtitle streams and container metadata
    pub media_file: PathBuf,
    pub input_directory: PathBuf,
    pub output_file: PathBuf,
    pub frame_rate: Rational,
    pub codecs: CodecParams,
}

/// Encodes the upscaled frames and muxes them with the original audio and
/// subtitles into a matroska file.
pub struct Mux {
    ffmpeg: PathBuf,
    process: ProcessHandle,
}

impl Mux {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self { ffmpeg: ffmpeg.into(), process: ProcessHandle::new() }
    }

    fn command(&self, args: &MuxArgs) -> Command {
        let codecs = &args.codecs;
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-hide_banner")
            .arg("-framerate")
            .arg(args.frame_rate.to_string())
            .arg("-i")
            .arg(args.input_directory.join(FRAME_PATTERN))
            .arg("-i")
            .arg(&args.media_file)
            .args(["-map", "0:v", "-map", "1:a?", "-map", "1:s?", "-f", "matroska"])
            .args(["-c:s", &codecs.subtitle_codec])
            .args(["-c:a", &codecs.audio_codec])
            .args(["-b:a", &codecs.audio_bitrate])
            .args(["-c:v", &codecs.video_codec])
            .arg("-crf")
            .arg(codecs.video_crf.to_string());
        if !codecs.video_preset.is_empty() {
            command.args(["-preset", &codecs.video_preset]);
        }
        if !codecs.video_tuning.is_empty() {
            command.args(["-tune", &codecs.video_tuning]);
        }
        command.args(["-pix_fmt", "yuv420p", "-y"]).arg(&args.output_file);
        command
    }

    fn execute(
        &self,
        args: &MuxArgs,
        context: &StageContext,
        started: Instant,
    ) -> Result<(), Error> {
        let total = count_frames(&args.input_directory)?;
        if total == 0 {
            return Err(Error::setup(
                &args.input_directory,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no frames to encode"),
            ));
        }

        let exit = self.process.run(self.command(args), context, |channel, line| {
            let frame = match channel {
                Channel::Stderr => ffmpeg_output::frame_number(&line),
                Channel::Stdout => None,
            };
            match frame {
                Some(frame) => {
                    let elapsed = started.elapsed();
                    context.progress(ProgressSnapshot::active(total as f64, frame as f64, elapsed))
                }
                None => context.log(channel, line),
            }
        })?;
        check_exit("ffmpeg", exit)
    }
}

impl Stage for Mux {
    type Args = MuxArgs;
    type Output = ();

    fn kind(&self) -> StageKind {
        StageKind::Mux
    }

    fn run(&self, args: &MuxArgs, context: &StageContext) -> Result<(), Error> {
        let started = Instant::now();
        context.progress(ProgressSnapshot::started(Duration::ZERO));
        let result = self.execute(args, context, started);
        finish(context, started, &result);
        result
    }

    fn abort(&self) {
        self.process.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn args(codecs: CodecParams) -> MuxArgs {
        MuxArgs {
            media_file: PathBuf::from("episode.mkv"),
            input_directory: PathBuf::from("upscaled"),
            output_file: PathBuf::from("episode.hd.mkv"),
            frame_rate: Rational::new(24000, 1001).unwrap(),
            codecs,
        }
    }

    fn parts(command: &Command) -> Vec<String> {
        command.get_args().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn maps_optional_audio_and_subtitles() {
        let command = Mux::new("ffmpeg").command(&args(CodecParams::default()));
        let parts = parts(&command);
        let joined = parts.join(" ");
        assert!(joined.starts_with("-hide_banner -framerate 24000/1001 -i "));
        assert!(joined.contains("-map 0:v -map 1:a? -map 1:s? -f matroska"));
        assert!(joined.contains("-c:v libx264 -crf 20 -preset slow -tune animation"));
        assert!(joined.contains("-pix_fmt yuv420p -y"));
        let pattern = Path::new("upscaled").join("%06d.png");
        assert!(parts.contains(&pattern.to_string_lossy().into_owned()));
        assert_eq!(parts.last().map(String::as_str), Some("episode.hd.mkv"));
    }

    #[test]
    fn omits_empty_tuning() {
        let codecs = CodecParams {
            video_tuning: String::new(),
            video_codec: String::from("libx265"),
            ..CodecParams::default()
        };
        let parts = parts(&Mux::new("ffmpeg").command(&args(codecs)));
        assert!(!parts.iter().any(|p| p == "-tune"));
        assert!(parts.iter().any(|p| p == "libx265"));
    }
}
