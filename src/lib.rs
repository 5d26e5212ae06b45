pub mod config;
pub mod console;
pub mod error;
pub mod event;
pub mod model;
pub mod orchestrator;
pub mod progress;
pub mod rational;
pub mod stages;
pub mod video;

pub use config::{Config, ToolPaths};
pub use console::Console;
pub use error::Error;
pub use event::{CancelToken, Channel, Event, RunOutcome, StageContext, StageKind};
pub use model::UpscaleModel;
pub use orchestrator::{Orchestrator, Phase, RunRequest, Stages};
pub use progress::{ProgressSnapshot, ProgressStatus};
pub use rational::Rational;
pub use video::{Geometry, MediaInfo};
