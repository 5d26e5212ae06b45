mod extract;
mod ffmpeg_output;
mod mux;
mod probe;
mod process;
mod upscale;

pub use extract::{Extract, ExtractArgs};
pub use mux::{CodecParams, Mux, MuxArgs};
pub use probe::Probe;
pub use process::{Exit, ProcessHandle};
pub use upscale::{Upscale, UpscaleArgs};

use crate::error::Error;
use crate::event::{Channel, StageContext, StageKind};
use crate::progress::{format_hms, ProgressSnapshot};

use std::path::Path;
use std::time::Instant;

/// File name pattern of the numbered frames passed between stages.
pub const FRAME_PATTERN: &str = "%06d.png";

/// One external tool invocation with progress reporting and abort support.
pub trait Stage: Send + Sync {
    type Args;
    type Output;

    fn kind(&self) -> StageKind;

    /// Runs the tool to completion. Emits `Active` snapshots while running and
    /// exactly one terminal snapshot before returning.
    fn run(&self, args: &Self::Args, context: &StageContext) -> Result<Self::Output, Error>;

    /// Kills the running tool, if any, and returns once it has exited.
    fn abort(&self);
}

/// Deletes `path` if present and creates it again, empty.
pub(crate) fn recreate_dir(path: &Path) -> Result<(), Error> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| Error::setup(path, e))?;
    }
    std::fs::create_dir_all(path).map_err(|e| Error::setup(path, e))
}

/// Counts the PNG frames in `dir`.
pub(crate) fn count_frames(dir: &Path) -> Result<u64, Error> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_png = path
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if is_png && path.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

pub(crate) fn check_exit(tool: &str, exit: Exit) -> Result<(), Error> {
    match exit {
        Exit::Code(0) => Ok(()),
        Exit::Code(code) => Err(Error::external_tool(tool, code)),
        Exit::Aborted => Err(Error::Aborted),
    }
}

/// Emits the terminal snapshot and a status line for a finished stage.
pub(crate) fn finish<T>(context: &StageContext, started: Instant, result: &Result<T, Error>) {
    let elapsed = started.elapsed();
    context.progress(ProgressSnapshot::finished(elapsed, result.is_ok()));
    match result {
        Ok(_) => context.log(
            Channel::Stdout,
            format!("{} finished after {}", context.stage(), format_hms(elapsed)),
        ),
        Err(e) => context.log(
            Channel::Stderr,
            format!("{} failed after {}: {}", context.stage(), format_hms(elapsed), e),
        ),
    }
}
