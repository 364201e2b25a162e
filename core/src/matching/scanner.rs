//! Incremental text window
//!
//! Holds the text of the current streaming turn and scans only what each
//! delta adds. Delimited tokens are extracted with a resumable span scanner;
//! substring searches start just before the old end of the text so a keyword
//! straddling the boundary is still found.
//!
//! Case folding is per character, so the folded text never depends on where
//! the stream was split. Offsets reported to callers are always raw offsets.

use memchr::memmem;
use tableau_types::DelimiterPair;

/// Lowercase `text` one character at a time
pub fn fold(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// A completed delimiter-bounded token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub folded: String,
    /// Byte offset just past the closing delimiter
    pub end: usize,
}

/// Resumable scanner for delimiter-bounded spans.
///
/// Delimiters pair up left to right: once a span closes, the next delimiter
/// opens a new span. With asymmetric delimiters a second opener restarts
/// the span, so the innermost span wins.
#[derive(Debug, Clone, Default)]
struct SpanScanner {
    cursor: usize,
    open_at: Option<usize>,
}

impl SpanScanner {
    fn scan(&mut self, text: &str, pair: DelimiterPair) -> Vec<(usize, usize)> {
        let bytes = text.as_bytes();
        let start = self.cursor.min(bytes.len());
        let mut spans = Vec::new();

        for rel in memchr::memchr2_iter(pair.open(), pair.close(), &bytes[start..]) {
            let pos = start + rel;
            let byte = bytes[pos];
            match self.open_at {
                Some(open) if byte == pair.close() => {
                    spans.push((open, pos));
                    self.open_at = None;
                }
                Some(_) => {
                    // asymmetric opener inside an open span
                    self.open_at = Some(pos + 1);
                }
                None if byte == pair.open() => {
                    self.open_at = Some(pos + 1);
                }
                None => {}
            }
        }

        self.cursor = bytes.len();
        spans
    }

    fn has_open_span(&self) -> bool {
        self.open_at.is_some()
    }
}

/// Accumulated text of one streaming turn
#[derive(Debug, Clone, Default)]
pub struct TextWindow {
    raw: String,
    folded: String,
    /// Raw end offset of the character each folded byte came from
    folded_to_raw: Vec<usize>,
    delimiters: DelimiterPair,
    spans: SpanScanner,
    tokens: Vec<Token>,
}

/// What a single append changed
#[derive(Debug, Clone, Default)]
pub struct Appended {
    /// Length of the raw text before the append
    pub raw_before: usize,
    /// Length of the folded text before the append
    pub folded_before: usize,
    /// Tokens completed by this append
    pub new_tokens: std::ops::Range<usize>,
}

impl TextWindow {
    pub fn new(delimiters: DelimiterPair) -> Self {
        Self {
            delimiters,
            ..Default::default()
        }
    }

    pub fn append(&mut self, delta: &str) -> Appended {
        let raw_before = self.raw.len();
        let folded_before = self.folded.len();
        let tokens_before = self.tokens.len();

        self.raw.push_str(delta);
        for (offset, ch) in delta.char_indices() {
            let raw_end = raw_before + offset + ch.len_utf8();
            for lower in ch.to_lowercase() {
                self.folded.push(lower);
                self.folded_to_raw.resize(self.folded.len(), raw_end);
            }
        }

        for (start, end) in self.spans.scan(&self.raw, self.delimiters) {
            let text = &self.raw[start..end];
            if text.is_empty() {
                continue;
            }
            self.tokens.push(Token {
                text: text.to_string(),
                folded: fold(text),
                end: end + 1,
            });
        }

        Appended {
            raw_before,
            folded_before,
            new_tokens: tokens_before..self.tokens.len(),
        }
    }

    pub fn clear(&mut self) {
        let delimiters = self.delimiters;
        *self = Self::new(delimiters);
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// True while a delimiter has opened a span that hasn't closed yet
    pub fn has_open_span(&self) -> bool {
        self.spans.has_open_span()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Find `needle` in the raw or folded text, starting no earlier than
    /// `min_start` minus the needle's overlap. `min_start` is an offset into
    /// the searched text (`folded_before` for folded searches). Returns the
    /// raw byte offset just past the last occurrence.
    pub fn find_from(&self, needle: &str, folded: bool, min_start: usize) -> Option<usize> {
        let haystack = if folded { &self.folded } else { &self.raw };
        if needle.is_empty() || needle.len() > haystack.len() {
            return None;
        }
        let overlap = needle.len() - 1;
        let start = floor_char_boundary(haystack, min_start.saturating_sub(overlap));
        let end = memmem::rfind(&haystack.as_bytes()[start..], needle.as_bytes())
            .map(|pos| start + pos + needle.len())?;
        if folded {
            self.folded_to_raw.get(end - 1).copied()
        } else {
            Some(end)
        }
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
