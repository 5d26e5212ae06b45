use crate::progress::ProgressSnapshot;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Probe,
    Extract,
    Upscale,
    Mux,
}

impl StageKind {
    /// Stages of a run, in execution order.
    pub const PIPELINE: [StageKind; 3] = [StageKind::Extract, StageKind::Upscale, StageKind::Mux];
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Probe => write!(f, "probe"),
            StageKind::Extract => write!(f, "extract"),
            StageKind::Upscale => write!(f, "upscale"),
            StageKind::Mux => write!(f, "mux"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Stdout => write!(f, "STDOUT"),
            Channel::Stderr => write!(f, "STDERR"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    Completed,
    Failed { stage: StageKind, message: String },
    Aborted,
}

/// Everything an attached shell gets to see of a run.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Log { stage: StageKind, channel: Channel, line: String },
    Progress { stage: StageKind, snapshot: ProgressSnapshot },
    /// Blank line in the log between two stages.
    Separator,
    /// Log and all snapshots were cleared for a new run.
    Reset,
    Finished(RunOutcome),
}

#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// What a stage is handed for one invocation: where to report and when to stop.
#[derive(Clone, Debug)]
pub struct StageContext {
    stage: StageKind,
    events: Sender<Event>,
    cancel: CancelToken,
}

impl StageContext {
    pub fn new(stage: StageKind, events: Sender<Event>, cancel: CancelToken) -> Self {
        Self { stage, events, cancel }
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    pub fn log(&self, channel: Channel, line: impl Into<String>) {
        let _ = self.events.send(Event::Log { stage: self.stage, channel, line: line.into() });
    }

    pub fn progress(&self, snapshot: ProgressSnapshot) {
        let _ = self.events.send(Event::Progress { stage: self.stage, snapshot });
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
