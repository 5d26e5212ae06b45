//! Runs one conversion at a time: extraction, upscaling and mux in sequence on
//! a worker thread, with abort and working directory cleanup.

use crate::config::Config;
use crate::error::Error;
use crate::event::{CancelToken, Event, RunOutcome, StageContext, StageKind};
use crate::model::UpscaleModel;
use crate::progress::ProgressSnapshot;
use crate::rational::Rational;
use crate::stages::{
    CodecParams, Extract, ExtractArgs, Mux, MuxArgs, Probe, Stage, Upscale, UpscaleArgs,
};
use crate::video::{Geometry, MediaInfo};

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Probing,
    Extracting,
    Upscaling,
    Muxing,
    Aborting,
}

impl Phase {
    pub fn is_running(&self) -> bool {
        matches!(self, Phase::Extracting | Phase::Upscaling | Phase::Muxing)
    }

    fn of(stage: StageKind) -> Self {
        match stage {
            StageKind::Probe => Phase::Probing,
            StageKind::Extract => Phase::Extracting,
            StageKind::Upscale => Phase::Upscaling,
            StageKind::Mux => Phase::Muxing,
        }
    }
}

/// Everything a run needs, fixed when it starts.
#[derive(Clone, Debug, PartialEq)]
pub struct RunRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub geometry: Geometry,
    pub frame_rate: Rational,
    pub estimated_frames: Option<u64>,
    pub model: UpscaleModel,
    pub denoise: u32,
    pub codecs: CodecParams,
}

impl RunRequest {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        media: &MediaInfo,
        config: &Config,
    ) -> Result<Self, Error> {
        Ok(Self {
            input: input.into(),
            output: output.into(),
            geometry: Geometry::from_media(media, config.output_height, config.scale)?,
            frame_rate: media.frame_rate,
            estimated_frames: media.estimated_frame_count(),
            model: config.model,
            denoise: config.denoise,
            codecs: config.codecs.clone(),
        })
    }
}

/// The four tool wrappers an orchestrator drives.
pub struct Stages<P, E, U, M> {
    pub probe: P,
    pub extract: E,
    pub upscale: U,
    pub mux: M,
}

impl Stages<Probe, Extract, Upscale, Mux> {
    pub fn from_config(config: &Config) -> Self {
        Self {
            probe: Probe::new(&config.tools.ffprobe),
            extract: Extract::new(&config.tools.ffmpeg),
            upscale: Upscale::new(&config.tools.waifu2x),
            mux: Mux::new(&config.tools.ffmpeg),
        }
    }
}

struct State {
    phase: Phase,
    /// Number of runs started so far.
    run: u64,
    /// Last run whose worker is done, `Finished` event included.
    settled: u64,
    cancel: CancelToken,
    outcome: Option<RunOutcome>,
}

struct Shared<P, E, U, M> {
    stages: Stages<P, E, U, M>,
    state: Mutex<State>,
    settled: Condvar,
    events: Sender<Event>,
    work_root: Option<PathBuf>,
}

/// Dropping an orchestrator does not stop its run; call [`Orchestrator::stop`]
/// or [`Orchestrator::wait`] first.
pub struct Orchestrator<P = Probe, E = Extract, U = Upscale, M = Mux> {
    shared: Arc<Shared<P, E, U, M>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a run as settled when its worker returns, and puts the orchestrator
/// back to idle if the worker panicked.
struct Settle<'a> {
    state: &'a Mutex<State>,
    settled: &'a Condvar,
    run: u64,
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        if thread::panicking() && state.run == self.run {
            error!("run worker panicked");
            state.phase = Phase::Idle;
            state.outcome = Some(RunOutcome::Aborted);
        }
        state.settled = state.settled.max(self.run);
        self.settled.notify_all();
    }
}

impl Orchestrator {
    pub fn new(config: &Config, events: Sender<Event>) -> Self {
        Self::with_stages(Stages::from_config(config), events, config.work_root.clone())
    }
}

impl<P, E, U, M> Orchestrator<P, E, U, M>
where
    P: Stage<Args = PathBuf, Output = MediaInfo> + 'static,
    E: Stage<Args = ExtractArgs, Output = ()> + 'static,
    U: Stage<Args = UpscaleArgs, Output = ()> + 'static,
    M: Stage<Args = MuxArgs, Output = ()> + 'static,
{
    pub fn with_stages(
        stages: Stages<P, E, U, M>,
        events: Sender<Event>,
        work_root: Option<PathBuf>,
    ) -> Self {
        let state = State {
            phase: Phase::Idle,
            run: 0,
            settled: 0,
            cancel: CancelToken::new(),
            outcome: None,
        };
        Self {
            shared: Arc::new(Shared {
                stages,
                state: Mutex::new(state),
                settled: Condvar::new(),
                events,
                work_root,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> Phase {
        lock(&self.shared.state).phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == Phase::Idle
    }

    /// Extraction and upscale directories used for `input`.
    pub fn working_directories(&self, input: &Path) -> (PathBuf, PathBuf) {
        self.shared.working_directories(input)
    }

    /// Reads the media information of `media_file`. Only allowed while idle.
    pub fn probe(&self, media_file: &Path) -> Result<MediaInfo, Error> {
        self.shared.enter_probe()?;
        self.shared.probe(media_file.to_path_buf())
    }

    /// Like [`Orchestrator::probe`], but returns at once; the result arrives on
    /// the returned receiver.
    pub fn probe_in_background(
        &self,
        media_file: PathBuf,
    ) -> Result<Receiver<Result<MediaInfo, Error>>, Error> {
        self.shared.enter_probe()?;
        let (sender, receiver) = bounded(1);
        let shared = Arc::clone(&self.shared);
        thread::spawn(move || {
            if let Err(unsent) = sender.send(shared.probe(media_file)) {
                debug!("probe result dropped, receiver is gone: {:?}", unsent.into_inner());
            }
        });
        Ok(receiver)
    }

    /// Starts a run on a worker thread. Fails without side effects when
    /// another run or a probe is in progress, or when a path is empty.
    pub fn start(&self, request: RunRequest) -> Result<(), Error> {
        let previous = {
            let mut state = lock(&self.shared.state);
            if state.phase != Phase::Idle {
                return Err(Error::Busy);
            }
            if request.input.as_os_str().is_empty() || request.output.as_os_str().is_empty() {
                return Err(Error::InvalidArgument(
                    "input and output paths must not be empty".to_string(),
                ));
            }

            state.phase = Phase::Extracting;
            state.run += 1;
            state.cancel = CancelToken::new();
            let run = state.run;
            let cancel = state.cancel.clone();

            info!("starting run for {}", request.input.display());
            self.shared.emit(Event::Reset);
            for stage in StageKind::PIPELINE {
                self.shared.emit(Event::Progress { stage, snapshot: ProgressSnapshot::idle() });
            }

            let shared = Arc::clone(&self.shared);
            let worker = thread::spawn(move || shared.execute(run, &request, &cancel));
            lock(&self.worker).replace(worker)
        };

        // The previous worker is past its last phase change and only needs the
        // state lock to settle.
        if let Some(previous) = previous {
            if previous.join().is_err() {
                error!("previous run worker panicked");
            }
        }
        Ok(())
    }

    /// Aborts the running stage and returns once cleanup has finished and
    /// the orchestrator is idle again. Does nothing while no run is active.
    pub fn stop(&self) {
        let (run, cancel) = {
            let mut state = lock(&self.shared.state);
            match state.phase {
                Phase::Idle | Phase::Probing => return,
                Phase::Aborting => {}
                _ => state.phase = Phase::Aborting,
            }
            (state.run, state.cancel.clone())
        };
        info!("aborting run");

        cancel.cancel();
        self.shared.abort_all();
        self.shared.wait_settled(run);
    }

    /// Blocks until the current run has finished and returns the outcome of
    /// the most recent run, if there was one.
    pub fn wait(&self) -> Option<RunOutcome> {
        let run = lock(&self.shared.state).run;
        self.shared.wait_settled(run)
    }
}

impl<P, E, U, M> Shared<P, E, U, M>
where
    P: Stage<Args = PathBuf, Output = MediaInfo>,
    E: Stage<Args = ExtractArgs, Output = ()>,
    U: Stage<Args = UpscaleArgs, Output = ()>,
    M: Stage<Args = MuxArgs, Output = ()>,
{
    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    fn working_directories(&self, input: &Path) -> (PathBuf, PathBuf) {
        let with_suffix = |suffix: &str| {
            let base = match (&self.work_root, input.file_name()) {
                (Some(root), Some(name)) => root.join(name),
                _ => input.to_path_buf(),
            };
            let mut name = OsString::from(base.as_os_str());
            name.push(suffix);
            PathBuf::from(name)
        };
        (with_suffix(".extracted"), with_suffix(".upscaled"))
    }

    fn wait_settled(&self, run: u64) -> Option<RunOutcome> {
        let mut state = lock(&self.state);
        while state.settled < run {
            state = self.settled.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        state.outcome.clone()
    }

    fn enter_probe(&self) -> Result<(), Error> {
        let mut state = lock(&self.state);
        if state.phase != Phase::Idle {
            return Err(Error::Busy);
        }
        state.phase = Phase::Probing;
        Ok(())
    }

    fn probe(&self, media_file: PathBuf) -> Result<MediaInfo, Error> {
        let probe = &self.stages.probe;
        let context = StageContext::new(probe.kind(), self.events.clone(), CancelToken::new());
        let result = probe.run(&media_file, &context);
        lock(&self.state).phase = Phase::Idle;
        result
    }

    /// Moves to the phase of `stage` unless a stop request came first.
    fn enter(&self, stage: StageKind, cancel: &CancelToken) -> bool {
        let mut state = lock(&self.state);
        if state.phase == Phase::Aborting || cancel.is_cancelled() {
            return false;
        }
        state.phase = Phase::of(stage);
        true
    }

    fn step<S: Stage>(
        &self,
        stage: &S,
        args: &S::Args,
        cancel: &CancelToken,
    ) -> Result<S::Output, (StageKind, Error)> {
        let kind = stage.kind();
        if !self.enter(kind, cancel) {
            return Err((kind, Error::Aborted));
        }
        let context = StageContext::new(kind, self.events.clone(), cancel.clone());
        stage.run(args, &context).map_err(|e| (kind, e))
    }

    fn run_stages(
        &self,
        request: &RunRequest,
        extracted: &Path,
        upscaled: &Path,
        cancel: &CancelToken,
    ) -> Result<(), (StageKind, Error)> {
        let extract = ExtractArgs {
            media_file: request.input.clone(),
            output_directory: extracted.to_path_buf(),
            width: request.geometry.extract_width,
            height: request.geometry.extract_height,
            estimated_frames: request.estimated_frames,
        };
        self.step(&self.stages.extract, &extract, cancel)?;
        self.emit(Event::Separator);

        let upscale = UpscaleArgs {
            input_directory: extracted.to_path_buf(),
            output_directory: upscaled.to_path_buf(),
            model: request.model,
            scale: request.geometry.scale,
            denoise: request.denoise,
        };
        self.step(&self.stages.upscale, &upscale, cancel)?;
        self.emit(Event::Separator);

        let mux = MuxArgs {
            media_file: request.input.clone(),
            input_directory: upscaled.to_path_buf(),
            output_file: request.output.clone(),
            frame_rate: request.frame_rate,
            codecs: request.codecs.clone(),
        };
        self.step(&self.stages.mux, &mux, cancel)
    }

    fn execute(&self, run: u64, request: &RunRequest, cancel: &CancelToken) {
        let _settle = Settle { state: &self.state, settled: &self.settled, run };
        let (extracted, upscaled) = self.working_directories(&request.input);
        let outcome = match self.run_stages(request, &extracted, &upscaled, cancel) {
            Ok(()) => {
                info!("wrote {}", request.output.display());
                RunOutcome::Completed
            }
            Err((stage, e)) if e.is_aborted() || cancel.is_cancelled() => {
                info!("run aborted during {}", stage);
                RunOutcome::Aborted
            }
            Err((stage, e)) => {
                error!("{} failed: {}", stage, e);
                RunOutcome::Failed { stage, message: e.to_string() }
            }
        };

        for dir in [&extracted, &upscaled] {
            remove_working_directory(dir);
        }
        {
            let mut state = lock(&self.state);
            state.outcome = Some(outcome.clone());
            state.phase = Phase::Idle;
        }
        self.emit(Event::Finished(outcome));
    }

    fn abort_all(&self) {
        self.stages.extract.abort();
        self.stages.upscale.abort();
        self.stages.mux.abort();
    }
}

fn remove_working_directory(dir: &Path) {
    if !dir.exists() {
        return;
    }
    if let Err(e) = std::fs::remove_dir_all(dir) {
        warn!("failed to remove {}: {}", dir.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Channel;
    use crossbeam_channel::unbounded;
    use std::marker::PhantomData;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    enum Behaviour {
        Succeed,
        Fail(i32),
        Block,
    }

    struct MockStage<A> {
        kind: StageKind,
        behaviour: Behaviour,
        creates: Option<PathBuf>,
        runs: AtomicUsize,
        kills: AtomicUsize,
        running: AtomicBool,
        release: (Sender<()>, Receiver<()>),
        _args: PhantomData<fn(&A)>,
    }

    impl<A> MockStage<A> {
        fn new(kind: StageKind, behaviour: Behaviour) -> Self {
            Self {
                kind,
                behaviour,
                creates: None,
                runs: AtomicUsize::new(0),
                kills: AtomicUsize::new(0),
                running: AtomicBool::new(false),
                release: bounded(1),
                _args: PhantomData,
            }
        }

        fn creating(mut self, dir: PathBuf) -> Self {
            self.creates = Some(dir);
            self
        }
    }

    impl<A> Stage for MockStage<A> {
        type Args = A;
        type Output = ();

        fn kind(&self) -> StageKind {
            self.kind
        }

        fn run(&self, _args: &A, context: &StageContext) -> Result<(), Error> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            context.log(Channel::Stdout, format!("{} running", self.kind));
            if let Some(dir) = &self.creates {
                std::fs::create_dir_all(dir)?;
                std::fs::write(dir.join("000001.png"), b"")?;
            }
            match self.behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail(code) => Err(Error::external_tool(self.kind.to_string(), code)),
                Behaviour::Block => {
                    self.running.store(true, Ordering::SeqCst);
                    let released = self.release.1.recv_timeout(Duration::from_secs(10));
                    self.running.store(false, Ordering::SeqCst);
                    match released {
                        Ok(()) => Err(Error::Aborted),
                        Err(_) => Ok(()),
                    }
                }
            }
        }

        fn abort(&self) {
            if self.running.load(Ordering::SeqCst) {
                self.kills.fetch_add(1, Ordering::SeqCst);
                let _ = self.release.0.try_send(());
            }
        }
    }

    type MockOrchestrator =
        Orchestrator<Probe, MockStage<ExtractArgs>, MockStage<UpscaleArgs>, MockStage<MuxArgs>>;

    fn orchestrator(
        root: &Path,
        extract: Behaviour,
        upscale: Behaviour,
        mux: Behaviour,
    ) -> (MockOrchestrator, Receiver<Event>, PathBuf) {
        let input = root.join("episode.mkv");
        let (events, receiver) = unbounded();
        let extracted = PathBuf::from(format!("{}.extracted", input.display()));
        let upscaled = PathBuf::from(format!("{}.upscaled", input.display()));
        let stages = Stages {
            probe: Probe::new("/nonexistent/ffprobe"),
            extract: MockStage::new(StageKind::Extract, extract).creating(extracted),
            upscale: MockStage::new(StageKind::Upscale, upscale).creating(upscaled),
            mux: MockStage::new(StageKind::Mux, mux),
        };
        (Orchestrator::with_stages(stages, events, None), receiver, input)
    }

    fn request(input: &Path) -> RunRequest {
        RunRequest {
            input: input.to_path_buf(),
            output: input.with_extension("hd.mkv"),
            geometry: Geometry::derive(1080, Rational::WIDESCREEN, 2).unwrap(),
            frame_rate: Rational::new(24000, 1001).unwrap(),
            estimated_frames: None,
            model: UpscaleModel::default(),
            denoise: 0,
            codecs: CodecParams::default(),
        }
    }

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn successful_run_emits_separators_and_finishes() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, events, input) =
            orchestrator(root.path(), Behaviour::Succeed, Behaviour::Succeed, Behaviour::Succeed);

        orchestrator.start(request(&input)).unwrap();
        assert_eq!(orchestrator.wait(), Some(RunOutcome::Completed));
        assert!(orchestrator.is_idle());

        let events: Vec<_> = events.try_iter().collect();
        assert_eq!(events.first(), Some(&Event::Reset));
        assert_eq!(events.iter().filter(|e| **e == Event::Separator).count(), 2);
        assert_eq!(events.last(), Some(&Event::Finished(RunOutcome::Completed)));

        let (extracted, upscaled) = orchestrator.working_directories(&input);
        assert!(!extracted.exists());
        assert!(!upscaled.exists());
    }

    #[test]
    fn failing_upscale_skips_mux_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, _events, input) =
            orchestrator(root.path(), Behaviour::Succeed, Behaviour::Fail(1), Behaviour::Succeed);

        orchestrator.start(request(&input)).unwrap();
        let outcome = orchestrator.wait();
        assert!(matches!(outcome, Some(RunOutcome::Failed { stage: StageKind::Upscale, .. })));
        assert_eq!(orchestrator.shared.stages.mux.runs.load(Ordering::SeqCst), 0);

        let (extracted, upscaled) = orchestrator.working_directories(&input);
        assert!(!extracted.exists());
        assert!(!upscaled.exists());
    }

    #[test]
    fn stop_while_idle_does_nothing() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, events, _input) =
            orchestrator(root.path(), Behaviour::Succeed, Behaviour::Succeed, Behaviour::Succeed);
        orchestrator.stop();
        assert!(orchestrator.is_idle());
        assert_eq!(orchestrator.wait(), None);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn start_while_running_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, _events, input) =
            orchestrator(root.path(), Behaviour::Block, Behaviour::Succeed, Behaviour::Succeed);

        orchestrator.start(request(&input)).unwrap();
        wait_until(|| orchestrator.shared.stages.extract.running.load(Ordering::SeqCst));
        assert!(matches!(orchestrator.start(request(&input)), Err(Error::Busy)));
        assert_eq!(orchestrator.phase(), Phase::Extracting);

        orchestrator.stop();
        assert_eq!(orchestrator.shared.stages.extract.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_paths_are_rejected_without_starting() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, events, input) =
            orchestrator(root.path(), Behaviour::Succeed, Behaviour::Succeed, Behaviour::Succeed);
        let mut bad = request(&input);
        bad.output = PathBuf::new();
        assert!(matches!(orchestrator.start(bad), Err(Error::InvalidArgument(_))));
        assert!(orchestrator.is_idle());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn stop_kills_active_stage_once_and_returns_idle() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, events, input) =
            orchestrator(root.path(), Behaviour::Succeed, Behaviour::Block, Behaviour::Succeed);

        orchestrator.start(request(&input)).unwrap();
        wait_until(|| orchestrator.shared.stages.upscale.running.load(Ordering::SeqCst));
        orchestrator.stop();

        let stages = &orchestrator.shared.stages;
        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert!(!stages.upscale.running.load(Ordering::SeqCst));
        assert_eq!(stages.upscale.kills.load(Ordering::SeqCst), 1);
        assert_eq!(stages.extract.kills.load(Ordering::SeqCst), 0);
        assert_eq!(stages.mux.runs.load(Ordering::SeqCst), 0);
        assert_eq!(orchestrator.wait(), Some(RunOutcome::Aborted));
        assert_eq!(events.try_iter().last(), Some(Event::Finished(RunOutcome::Aborted)));

        let (extracted, upscaled) = orchestrator.working_directories(&input);
        assert!(!extracted.exists());
        assert!(!upscaled.exists());
    }

    #[test]
    fn stop_aborts_while_another_thread_waits() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, _events, input) =
            orchestrator(root.path(), Behaviour::Succeed, Behaviour::Block, Behaviour::Succeed);

        orchestrator.start(request(&input)).unwrap();
        wait_until(|| orchestrator.shared.stages.upscale.running.load(Ordering::SeqCst));

        thread::scope(|scope| {
            let waiter = scope.spawn(|| orchestrator.wait());
            thread::sleep(Duration::from_millis(50));

            let stopping = Instant::now();
            orchestrator.stop();
            assert!(stopping.elapsed() < Duration::from_secs(5));
            assert_eq!(orchestrator.phase(), Phase::Idle);
            assert_eq!(orchestrator.shared.stages.upscale.kills.load(Ordering::SeqCst), 1);
            assert_eq!(waiter.join().unwrap(), Some(RunOutcome::Aborted));
        });
        assert_eq!(orchestrator.shared.stages.mux.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn a_second_run_can_follow_a_stopped_one() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, _events, input) =
            orchestrator(root.path(), Behaviour::Succeed, Behaviour::Block, Behaviour::Succeed);

        orchestrator.start(request(&input)).unwrap();
        wait_until(|| orchestrator.shared.stages.upscale.running.load(Ordering::SeqCst));
        orchestrator.stop();

        orchestrator.start(request(&input)).unwrap();
        wait_until(|| orchestrator.shared.stages.upscale.running.load(Ordering::SeqCst));
        orchestrator.stop();
        assert_eq!(orchestrator.shared.stages.upscale.kills.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.wait(), Some(RunOutcome::Aborted));
    }

    #[test]
    fn probe_is_rejected_while_running() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, _events, input) =
            orchestrator(root.path(), Behaviour::Block, Behaviour::Succeed, Behaviour::Succeed);
        orchestrator.start(request(&input)).unwrap();
        wait_until(|| orchestrator.shared.stages.extract.running.load(Ordering::SeqCst));
        assert!(matches!(orchestrator.probe(&input), Err(Error::Busy)));
        orchestrator.stop();
    }

    #[test]
    fn failed_probe_returns_to_idle() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, _events, input) =
            orchestrator(root.path(), Behaviour::Succeed, Behaviour::Succeed, Behaviour::Succeed);
        assert!(matches!(orchestrator.probe(&input), Err(Error::Spawn { .. })));
        assert!(orchestrator.is_idle());

        let receiver = orchestrator.probe_in_background(input).unwrap();
        assert!(receiver.recv().unwrap().is_err());
        wait_until(|| orchestrator.is_idle());
    }

    #[test]
    fn background_probe_without_a_receiver_returns_to_idle() {
        let root = tempfile::tempdir().unwrap();
        let (orchestrator, _events, input) =
            orchestrator(root.path(), Behaviour::Succeed, Behaviour::Succeed, Behaviour::Succeed);
        drop(orchestrator.probe_in_background(input.clone()).unwrap());
        wait_until(|| orchestrator.is_idle());
        assert!(orchestrator.probe_in_background(input).is_ok());
        wait_until(|| orchestrator.is_idle());
    }

    #[test]
    fn work_root_holds_working_directories() {
        let (events, _receiver) = unbounded();
        let stages = Stages {
            probe: Probe::new("ffprobe"),
            extract: MockStage::<ExtractArgs>::new(StageKind::Extract, Behaviour::Succeed),
            upscale: MockStage::<UpscaleArgs>::new(StageKind::Upscale, Behaviour::Succeed),
            mux: MockStage::<MuxArgs>::new(StageKind::Mux, Behaviour::Succeed),
        };
        let work_root = Some(PathBuf::from("/scratch"));
        let orchestrator = Orchestrator::with_stages(stages, events, work_root);
        let (extracted, upscaled) = orchestrator.working_directories(Path::new("/videos/ep01.mkv"));
        assert_eq!(extracted, PathBuf::from("/scratch/ep01.mkv.extracted"));
        assert_eq!(upscaled, PathBuf::from("/scratch/ep01.mkv.upscaled"));
    }
}
