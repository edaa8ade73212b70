//! Line-oriented rendering for terminals without a full-screen UI.

use paperlens_core::SessionView;

/// Turns successive views into the lines that changed since the last one.
#[derive(Debug, Default)]
pub struct PlainReporter {
    run: u64,
    headline: String,
    progress_step: Option<u8>,
    printed_items: usize,
    preview_chars: usize,
}

impl PlainReporter {
    pub fn observe(&mut self, view: &SessionView) -> Vec<String> {
        let mut lines = Vec::new();

        if view.run != self.run {
            self.run = view.run;
            self.printed_items = 0;
            self.preview_chars = 0;
            self.progress_step = None;
        }

        let headline = view.headline();
        if headline != self.headline {
            self.headline = headline.to_string();
            lines.push(format!("[{:>3}%] {headline}", view.progress));
        }

        // Progress is reported in 10% steps to keep the log readable.
        let step = view.progress / 10;
        if self.progress_step.is_some_and(|last| step > last) {
            lines.push(format!("[{:>3}%]", view.progress));
        }
        self.progress_step = Some(step.max(self.progress_step.unwrap_or(0)));

        if view.finalized {
            for item in view.items.iter().skip(self.printed_items) {
                lines.push(format!("{} {}: {}", item.icon, item.title, item.content));
            }
            self.printed_items = self.printed_items.max(view.items.len());
        } else {
            let shown = view.preview.chars().count();
            if shown > self.preview_chars && view.preview.ends_with(|c: char| ".!?。！？；;".contains(c)) {
                let fresh: String = view.preview.chars().skip(self.preview_chars).collect();
                lines.push(format!("  … {}", fresh.trim()));
                self.preview_chars = shown;
            }
        }

        lines
    }
}
