use crate::error::Error;
use crate::event::{StageContext, StageKind};
use crate::model::UpscaleModel;
use crate::progress::ProgressSnapshot;

use super::process::ProcessHandle;
use super::{check_exit, count_frames, finish, recreate_dir, Stage};

use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, Receiver};
use log::debug;

#[derive(Clone, Debug, PartialEq)]
pub struct UpscaleArgs {
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
    pub model: UpscaleModel,
    pub scale: u32,
    pub denoise: u32,
}

/// Runs waifu2x-ncnn-vulkan over a directory of frames.
///
/// The upscaler prints nothing usable while it works, so progress comes from
/// counting the frames that have appeared in the output directory.
pub struct Upscale {
    waifu2x: PathBuf,
    process: ProcessHandle,
    poll_interval: Duration,
}

impl Upscale {
    pub const POLL_INTERVAL: Duration = Duration::from_millis(2500);

    pub fn new(waifu2x: impl Into<PathBuf>) -> Self {
        Self {
            waifu2x: waifu2x.into(),
            process: ProcessHandle::new(),
            poll_interval: Self::POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn command(&self, args: &UpscaleArgs) -> Command {
        let mut command = Command::new(&self.waifu2x);
        command
            .arg("-i")
            .arg(&args.input_directory)
            .arg("-o")
            .arg(&args.output_directory)
            .args(["-f", "png", "-m", args.model.id()])
            .arg("-s")
            .arg(args.scale.to_string())
            .arg("-n")
            .arg(args.denoise.to_string());
        command
    }

    /// Reports the output frame count every tick until `stop` disconnects.
    fn poll(
        &self,
        output: &Path,
        total: u64,
        started: Instant,
        context: &StageContext,
        stop: Receiver<()>,
    ) {
        let ticker = tick(self.poll_interval);
        let total = total as f64;
        loop {
            select! {
                recv(stop) -> _ => break,
                recv(ticker) -> _ => match count_frames(output) {
                    Ok(done) => {
                        let elapsed = started.elapsed();
                        context.progress(ProgressSnapshot::active(total, done as f64, elapsed))
                    }
                    Err(e) => debug!("failed to count upscaled frames: {}", e),
                },
            }
        }
    }

    fn execute(
        &self,
        args: &UpscaleArgs,
        context: &StageContext,
        started: Instant,
    ) -> Result<(), Error> {
        args.model.validate(args.scale, args.denoise)?;
        let total = count_frames(&args.input_directory)?;
        if total == 0 {
            return Err(Error::setup(
                &args.input_directory,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no frames to upscale"),
            ));
        }
        recreate_dir(&args.output_directory)?;

        let exit = thread::scope(|scope| {
            let (stop_sender, stop_receiver) = bounded::<()>(0);
            scope.spawn(|| {
                self.poll(&args.output_directory, total, started, context, stop_receiver)
            });
            let exit = self
                .process
                .run(self.command(args), context, |channel, line| context.log(channel, line));
            drop(stop_sender);
            exit
        })?;
        check_exit("waifu2x-ncnn-vulkan", exit)
    }
}

impl Stage for Upscale {
    type Args = UpscaleArgs;
    type Output = ();

    fn kind(&self) -> StageKind {
        StageKind::Upscale
    }

    fn run(&self, args: &UpscaleArgs, context: &StageContext) -> Result<(), Error> {
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
