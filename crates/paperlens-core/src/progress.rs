//! Perceived-progress model.
//!
//! A target percentage is derived from the session phase, and the displayed
//! value chases the highest target seen in the current run with a discrete
//! exponential filter. The displayed value never decreases within a run, so a
//! burst of data (a whole payload in one frame) shows up as a quick climb
//! instead of a jump.

/// Session phase as far as progress is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    NoDocument,
    /// Document present, connection not open.
    Connecting,
    /// Connected and not finalized.
    Streaming { shown_chars: usize },
    Finalized { displayed: usize, total: usize },
}

pub fn progress_target(phase: ProgressPhase) -> u8 {
    match phase {
        ProgressPhase::NoDocument => 0,
        ProgressPhase::Connecting => 6,
        ProgressPhase::Streaming { shown_chars: 0 } => 12,
        ProgressPhase::Streaming { shown_chars } => (14 + shown_chars / 35).min(84) as u8,
        ProgressPhase::Finalized { total: 0, .. } => 100,
        ProgressPhase::Finalized { displayed, total } => {
            let ratio = (displayed as f64 / total as f64).min(1.0);
            (86.0 + 14.0 * ratio).round() as u8
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressFilter {
    value: f64,
    ceiling: f64,
    gain: f64,
    epsilon: f64,
}

impl ProgressFilter {
    pub fn new(gain: f64, epsilon: f64) -> Self {
        Self {
            value: 0.0,
            ceiling: 0.0,
            gain: gain.clamp(0.01, 1.0),
            epsilon: epsilon.max(0.0),
        }
    }

    /// Record the latest target. Lower targets never lower the ceiling.
    pub fn observe(&mut self, target: u8) {
        self.ceiling = self.ceiling.max(f64::from(target.min(100)));
    }

    /// Advance one tick. Returns whether the value moved.
    pub fn step(&mut self) -> bool {
        let goal = self.goal();
        let gap = goal - self.value;
        if gap <= 0.0 {
            return false;
        }
        if gap < self.epsilon {
            self.value = goal;
        } else {
            self.value += gap * self.gain;
        }
        true
    }

    pub fn is_settled(&self) -> bool {
        self.goal() - self.value <= 0.0
    }

    /// Whether a tick would move the value once `target` is observed.
    pub fn trails(&self, target: u8) -> bool {
        self.goal().max(f64::from(target.min(100))) > self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn percent(&self) -> u8 {
        self.value.round().clamp(0.0, 100.0) as u8
    }

    /// Start a new run from zero.
    pub fn reset(&mut self) {
        self.value = 0.0;
        self.ceiling = 0.0;
    }

    fn goal(&self) -> f64 {
        self.ceiling.max(self.value)
    }
}
