//! Tick-driven pacers for the typed-out preview and the final item reveal.
//!
//! Both pacers are plain counters; the session driver decides when to tick them.

/// Shown-character counter for the streaming preview.
#[derive(Debug, Clone)]
pub struct TextPreview {
    shown: usize,
    step: usize,
}

impl TextPreview {
    pub fn new(step: usize) -> Self {
        Self {
            shown: 0,
            step: step.max(1),
        }
    }

    pub fn shown(&self) -> usize {
        self.shown
    }

    /// Whether the preview still trails `available` characters.
    pub fn is_behind(&self, available: usize) -> bool {
        self.shown < available
    }

    /// Move toward `available` by one step. Never overshoots, never regresses.
    pub fn advance(&mut self, available: usize) -> bool {
        if self.shown >= available {
            return false;
        }
        self.shown = (self.shown + self.step).min(available);
        true
    }

    pub fn reset(&mut self) {
        self.shown = 0;
    }
}

/// Displayed-count of final items.
#[derive(Debug, Clone, Default)]
pub struct ItemReveal {
    displayed: usize,
    total: usize,
}

impl ItemReveal {
    /// Begin a new reveal run of `total` items from zero.
    pub fn restart(&mut self, total: usize) {
        self.displayed = 0;
        self.total = total;
    }

    pub fn advance(&mut self) -> bool {
        if self.is_complete() {
            return false;
        }
        self.displayed += 1;
        true
    }

    /// A run over zero items is complete as soon as it starts.
    pub fn is_complete(&self) -> bool {
        self.displayed >= self.total
    }

    pub fn displayed(&self) -> usize {
        self.displayed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Fraction of items shown, in `0.0..=1.0`; `1.0` for an empty run.
    pub fn ratio(&self) -> f64 {
        reveal_ratio(self.displayed, self.total)
    }

    pub fn reset(&mut self) {
        self.displayed = 0;
        self.total = 0;
    }
}

pub fn reveal_ratio(displayed: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (displayed as f64 / total as f64).min(1.0)
}
