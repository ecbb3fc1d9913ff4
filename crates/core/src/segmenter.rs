//! Sentence Segmentation
//!
//! Text from the reasoning engine arrives in arbitrary fragments that may split
//! a sentence (or a word) anywhere. `SentenceSegmenter` accumulates fragments
//! for one turn and hands back complete sentences as soon as a terminator is
//! seen, so synthesis can start before the turn is finished.

const TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Per-turn accumulator of text that has not yet been emitted as a sentence.
#[derive(Debug, Default, Clone)]
pub struct SentenceSegmenter {
    buffer: String,
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment and returns the sentences it completed, in order.
    ///
    /// Everything up to and including the last terminator in the buffer is
    /// emitted; the tail after it is kept for the next fragment.
    pub fn push(&mut self, fragment: &str) -> Sentences {
        if fragment.is_empty() {
            return Sentences::default();
        }
        self.buffer.push_str(fragment);

        let Some(last) = self.buffer.rfind(TERMINATORS) else {
            return Sentences::default();
        };
        let remainder = self.buffer.split_off(last + 1);
        let completed = std::mem::replace(&mut self.buffer, remainder);
        Sentences::new(completed)
    }

    /// Empties the buffer at turn completion.
    ///
    /// Returns `None` when nothing but whitespace is left.
    pub fn flush(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let trimmed = rest.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Lazy iterator over the sentences contained in one completed span of text.
///
/// The span always ends with a terminator and each item is trimmed. A
/// terminator run that opens the span (the end of a run split across
/// fragments) comes out on its own, so no input is lost.
#[derive(Debug, Default, Clone)]
pub struct Sentences {
    text: String,
    pos: usize,
}

impl Sentences {
    fn new(text: String) -> Self {
        Self { text, pos: 0 }
    }
}

impl Iterator for Sentences {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let rest = &self.text[self.pos..];
        if rest.trim().is_empty() {
            self.pos = self.text.len();
            return None;
        }
        let mut end = rest.find(TERMINATORS).map_or(rest.len(), |idx| idx + 1);
        // Runs like "...", "?!" or ". ." stay attached to their sentence.
        loop {
            let tail = &rest[end..];
            let spaced = tail.trim_start();
            let run = spaced.len() - spaced.trim_start_matches(TERMINATORS).len();
            if run == 0 {
                break;
            }
            end += tail.len() - spaced.len() + run;
        }
        self.pos += end;
        Some(rest[..end].trim().to_string())
    }
}
