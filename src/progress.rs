use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProgressStatus {
    #[default]
    None,
    Active,
    Success,
    Failed,
}

impl ProgressStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressStatus::Success | ProgressStatus::Failed)
    }
}

/// Position of a stage at one instant. Snapshots are replaced, never updated.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressSnapshot {
    pub visible: bool,
    pub indeterminate: bool,
    pub minimum: f64,
    pub maximum: f64,
    pub value: f64,
    pub elapsed: Duration,
    pub status: ProgressStatus,
}

impl ProgressSnapshot {
    pub fn new(
        visible: bool,
        indeterminate: bool,
        minimum: f64,
        maximum: f64,
        value: f64,
        elapsed: Duration,
        status: ProgressStatus,
    ) -> Self {
        let maximum = maximum.max(minimum);
        let value = if indeterminate { value } else { value.clamp(minimum, maximum) };
        Self { visible, indeterminate, minimum, maximum, value, elapsed, status }
    }

    /// Snapshot shown before a stage has started.
    pub fn idle() -> Self {
        Self::new(true, false, 0.0, 1.0, 0.0, Duration::ZERO, ProgressStatus::None)
    }

    /// Indeterminate snapshot for a stage whose total is not known yet.
    pub fn started(elapsed: Duration) -> Self {
        Self::new(true, true, 0.0, 1.0, 0.0, elapsed, ProgressStatus::Active)
    }

    pub fn active(maximum: f64, value: f64, elapsed: Duration) -> Self {
        Self::new(true, false, 0.0, maximum, value, elapsed, ProgressStatus::Active)
    }

    pub fn finished(elapsed: Duration, success: bool) -> Self {
        let status = if success { ProgressStatus::Success } else { ProgressStatus::Failed };
        Self::new(true, false, 0.0, 1.0, 1.0, elapsed, status)
    }

    fn has_estimate(&self) -> bool {
        !self.indeterminate && self.value > 0.0
    }

    /// Time left at the current rate, or `None` while no work has been done.
    pub fn remaining(&self) -> Option<Duration> {
        if !self.has_estimate() {
            return None;
        }
        Some(self.elapsed.mul_f64((self.maximum - self.value) / self.value))
    }

    /// Projected total run time, or `None` while no work has been done.
    pub fn estimated_duration(&self) -> Option<Duration> {
        if !self.has_estimate() {
            return None;
        }
        Some(self.elapsed.mul_f64(self.maximum / self.value))
    }

    pub fn fraction(&self) -> f64 {
        let span = self.maximum - self.minimum;
        if self.indeterminate || span <= 0.0 {
            return 0.0;
        }
        ((self.value - self.minimum) / span).clamp(0.0, 1.0)
    }
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

/// Formats a duration as `hh:mm:ss`.
pub fn format_hms(duration: Duration) -> String {
    let seconds = duration.as_secs();
    format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds / 60) % 60, seconds % 60)
}
