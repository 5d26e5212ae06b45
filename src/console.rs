use crate::event::{Channel, Event, RunOutcome, StageKind};
use crate::progress::{format_hms, ProgressSnapshot, ProgressStatus};

use std::collections::HashMap;
use std::fmt::Write;

use crossbeam_channel::Receiver;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use log::debug;

/// Terminal view of a run: one bar per pipeline stage.
pub struct Console {
    multi: MultiProgress,
    bars: HashMap<StageKind, ProgressBar>,
}

fn style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(concat!(
            "[{elapsed_precise}] [{eta_precise}] [{wide_bar:.white/green}] ",
            "{pos}/{len} {percent} {msg}",
        ))
        .expect("progress template is valid")
        .progress_chars("█▓▒░-")
        .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })
        .with_key("percent", |state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "({:.0}%)", state.fraction() * 100.0);
        })
}

impl Console {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let bars = StageKind::PIPELINE
            .into_iter()
            .map(|stage| {
                let bar = multi.add(ProgressBar::new(1));
                bar.set_style(style());
                bar.set_message(stage.to_string());
                (stage, bar)
            })
            .collect();
        Self { multi, bars }
    }

    /// Renders events until the run finishes and returns its outcome, or
    /// `None` if the sender went away first.
    pub fn run(&self, events: &Receiver<Event>) -> Option<RunOutcome> {
        events.iter().find_map(|event| self.handle(event))
    }

    fn handle(&self, event: Event) -> Option<RunOutcome> {
        match event {
            Event::Log { stage, channel, line } => {
                self.multi.suspend(|| match channel {
                    Channel::Stdout => debug!("[{}] {}", stage, line),
                    Channel::Stderr => debug!("[{}] {}: {}", stage, channel, line),
                });
            }
            Event::Progress { stage, snapshot } => {
                if let Some(bar) = self.bars.get(&stage) {
                    update(bar, stage, &snapshot);
                }
            }
            Event::Separator => {}
            Event::Reset => {
                for bar in self.bars.values() {
                    bar.reset();
                }
            }
            Event::Finished(outcome) => return Some(outcome),
        }
        None
    }

    pub fn bar(&self, stage: StageKind) -> Option<&ProgressBar> {
        self.bars.get(&stage)
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

fn update(bar: &ProgressBar, stage: StageKind, snapshot: &ProgressSnapshot) {
    match snapshot.status {
        ProgressStatus::None => {
            bar.set_length(1);
            bar.set_position(0);
            bar.set_message(stage.to_string());
        }
        ProgressStatus::Active if snapshot.indeterminate => {
            if snapshot.elapsed.is_zero() {
                bar.reset_elapsed();
            }
            bar.set_message(format!("{} [working]", stage));
        }
        ProgressStatus::Active => {
            bar.set_length(snapshot.maximum.round() as u64);
            bar.set_position(snapshot.value.round() as u64);
            let remaining = snapshot
                .remaining()
                .map(format_hms)
                .unwrap_or_else(|| "unknown".to_string());
            bar.set_message(format!("{} [remaining: {}]", stage, remaining));
        }
        ProgressStatus::Success => {
            bar.set_position(bar.length().unwrap_or(1));
            let elapsed = format_hms(snapshot.elapsed);
            bar.finish_with_message(format!("{} [done in {}]", stage, elapsed));
        }
        ProgressStatus::Failed => {
            let elapsed = format_hms(snapshot.elapsed);
            bar.abandon_with_message(format!("{} [failed after {}]", stage, elapsed));
        }
    }
}
