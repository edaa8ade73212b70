//! Sentence-aware segmentation of streamed text.
//!
//! Before the structured result exists, the raw model output is cut into
//! display-sized segments so the reader sees something card-shaped while the
//! stream is still running. Segmentation is always recomputed from the full
//! accumulated text, never incrementally.

use paperlens_schema::{DisplayItem, Provenance, Stage};

use crate::config::SegmenterConfig;

/// Terminators that end a segment wherever they occur.
const CJK_TERMINATORS: [char; 4] = ['。', '！', '？', '；'];
/// Terminators that end a segment only before whitespace or end of text.
const LATIN_TERMINATORS: [char; 4] = ['.', '!', '?', ';'];

#[derive(Debug, Clone)]
pub struct Segmenter {
    max_chars: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(&SegmenterConfig::default())
    }
}

impl Segmenter {
    pub fn new(config: &SegmenterConfig) -> Self {
        Self {
            max_chars: config.max_segment_chars.max(1),
        }
    }

    /// Build the transient display items for the accumulated text.
    pub fn segment(&self, text: &str) -> Vec<DisplayItem> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(index, content)| {
                let stage = Stage::from_position(index);
                DisplayItem {
                    id: format!("stream-{index}"),
                    stage,
                    icon: stage.icon().to_string(),
                    title: format!("Segment {:02}", index + 1),
                    content,
                    provenance: Provenance::Transient,
                }
            })
            .collect()
    }

    /// Split normalized text into segments of at most `max_chars` characters.
    pub fn split(&self, text: &str) -> Vec<String> {
        let normalized = normalize_whitespace(text);
        let chars: Vec<char> = normalized.chars().collect();

        let mut segments = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let bound = (start + self.max_chars).min(chars.len());
            let cut = if bound == chars.len() {
                bound
            } else {
                find_break(&chars[start..bound], chars.get(bound).copied())
                    .map(|offset| start + offset)
                    .unwrap_or(bound)
            };

            let segment: String = chars[start..cut].iter().collect();
            let trimmed = segment.trim();
            if !trimmed.is_empty() {
                segments.push(trimmed.to_string());
            }
            start = cut;
        }
        segments
    }
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Position just past the last terminator in `window`, if any.
fn find_break(window: &[char], after_window: Option<char>) -> Option<usize> {
    (0..window.len()).rev().find_map(|i| {
        let c = window[i];
        if CJK_TERMINATORS.contains(&c) {
            return Some(i + 1);
        }
        if LATIN_TERMINATORS.contains(&c) {
            let next = window.get(i + 1).copied().or(after_window);
            if next.map_or(true, char::is_whitespace) {
                return Some(i + 1);
            }
        }
        None
    })
}
