use crate::error::Error;
use crate::event::{Channel, StageContext, StageKind};
use crate::progress::ProgressSnapshot;

use super::ffmpeg_output;
use super::process::ProcessHandle;
use super::{check_exit, finish, recreate_dir, Stage, FRAME_PATTERN};

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq)]
pub struct ExtractArgs {
    pub media_file: PathBuf,
    pub output_directory: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Enables frame based progress; time based progress is used without it.
    pub estimated_frames: Option<u64>,
}

/// Turns the extraction stderr stream into a progress position.
#[derive(Debug)]
enum Tracker {
    Frames { total: u64 },
    Time { total: Option<Duration> },
}

/// What a progress line says about the stage position.
#[derive(Debug, PartialEq)]
enum Position {
    Unknown,
    At { maximum: f64, value: f64 },
}

impl Tracker {
    fn new(estimated_frames: Option<u64>) -> Self {
        match estimated_frames {
            Some(total) if total > 0 => Tracker::Frames { total },
            _ => Tracker::Time { total: None },
        }
    }

    /// Returns a position for progress lines, `None` for everything else.
    fn update(&mut self, line: &str) -> Option<Position> {
        match self {
            Tracker::Frames { total } => {
                let frame = ffmpeg_output::frame_number(line)?;
                Some(Position::At { maximum: *total as f64, value: frame as f64 })
            }
            Tracker::Time { total } => {
                if total.is_none() {
                    if let Some(duration) = ffmpeg_output::declared_duration(line) {
                        *total = Some(duration);
                        return None;
                    }
                }
                let time = ffmpeg_output::position(line)?;
                Some(match total {
                    Some(total) if !total.is_zero() => Position::At {
                        maximum: total.as_secs_f64(),
                        value: time.as_secs_f64(),
                    },
                    _ => Position::Unknown,
                })
            }
        }
    }
}

/// Rasterizes a video into numbered PNG frames with ffmpeg.
pub struct Extract {
    ffmpeg: PathBuf,
    process: ProcessHandle,
}

impl Extract {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self { ffmpeg: ffmpeg.into(), process: ProcessHandle::new() }
    }

    fn command(&self, args: &ExtractArgs) -> Command {
        let mut command = Command::new(&self.ffmpeg);
        command
            .arg("-hide_banner")
            .arg("-i")
            .arg(&args.media_file)
            .arg("-filter:v")
            .arg(format!("scale={}x{}:flags=lanczos,setsar=1:1", args.width, args.height))
            .args(["-f", "image2"])
            .arg(args.output_directory.join(FRAME_PATTERN));
        command
    }

    fn execute(
        &self,
        args: &ExtractArgs,
        context: &StageContext,
        started: Instant,
    ) -> Result<(), Error> {
        if args.width == 0 || args.height == 0 {
            return Err(Error::InvalidArgument(format!(
                "extraction size must not be empty, got {}x{}",
                args.width, args.height
            )));
        }
        recreate_dir(&args.output_directory)?;

        let mut tracker = Tracker::new(args.estimated_frames);
        let exit = self.process.run(self.command(args), context, |channel, line| {
            let position = match channel {
                Channel::Stderr => tracker.update(&line),
                Channel::Stdout => None,
            };
            match position {
                Some(Position::At { maximum, value }) => {
                    context.progress(ProgressSnapshot::active(maximum, value, started.elapsed()))
                }
                Some(Position::Unknown) => {
                    context.progress(ProgressSnapshot::started(started.elapsed()))
                }
                None => context.log(channel, line),
            }
        })?;
        check_exit("ffmpeg", exit)
    }
}

impl Stage for Extract {
    type Args = ExtractArgs;
    type Output = ();

    fn kind(&self) -> StageKind {
        StageKind::Extract
    }

    fn run(&self, args: &ExtractArgs, context: &StageContext) -> Result<(), Error> {
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

    #[test]
    fn frame_tracker_divides_by_estimate() {
        let mut tracker = Tracker::new(Some(480));
        assert_eq!(
            tracker.update("frame=  120 fps=60 q=-0.0 size=N/A time=00:00:05.00"),
            Some(Position::At { maximum: 480.0, value: 120.0 })
        );
        assert_eq!(tracker.update("  Duration: 00:00:20.00, start: 0.0"), None);
    }

    #[test]
    fn time_tracker_uses_first_declared_duration() {
        let mut tracker = Tracker::new(None);
        assert_eq!(tracker.update("time=00:00:01.00"), Some(Position::Unknown));
        assert_eq!(tracker.update("  Duration: 00:00:20.00, start: 0.000000"), None);
        assert_eq!(tracker.update("      DURATION        : 00:00:40.000000000"), None);
        assert_eq!(
            tracker.update("frame=  120 fps=60 time=00:00:05.00 speed=2x"),
            Some(Position::At { maximum: 20.0, value: 5.0 })
        );
    }

    #[test]
    fn zero_estimate_falls_back_to_time() {
        assert!(matches!(Tracker::new(Some(0)), Tracker::Time { total: None }));
    }

    #[test]
    fn builds_lanczos_scale_command() {
        let extract = Extract::new("ffmpeg");
        let args = ExtractArgs {
            media_file: PathBuf::from("in.mkv"),
            output_directory: PathBuf::from("work"),
            width: 960,
            height: 540,
            estimated_frames: None,
        };
        let command = extract.command(&args);
        let parts: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert!(parts.contains(&"scale=960x540:flags=lanczos,setsar=1:1".to_string()));
        let pattern = Path::new("work").join("%06d.png");
        assert_eq!(parts.last().map(String::as_str), pattern.to_str());
    }
}
