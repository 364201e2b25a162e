//! Delimiter pair used for pipe-bounded keyword spans.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelimiterError {
    #[error("delimiter {0:?} is not an ASCII character")]
    NotAscii(char),
    #[error("delimiter {0:?} is alphanumeric or whitespace")]
    Ambiguous(char),
}

/// Open/close delimiters bounding a token, `|token|` by default.
///
/// Both characters must be ASCII punctuation so the scanner can work on bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDelimiterPair", into = "RawDelimiterPair")]
pub struct DelimiterPair {
    open: u8,
    close: u8,
}

impl DelimiterPair {
    pub const PIPE: DelimiterPair = DelimiterPair {
        open: b'|',
        close: b'|',
    };

    pub fn new(open: char, close: char) -> Result<Self, DelimiterError> {
        Ok(Self {
            open: validate(open)?,
            close: validate(close)?,
        })
    }

    pub fn open(&self) -> u8 {
        self.open
    }

    pub fn close(&self) -> u8 {
        self.close
    }

    /// True when the same character opens and closes a span
    pub fn is_symmetric(&self) -> bool {
        self.open == self.close
    }

    /// Wrap a token in this pair, e.g. for building test text or hints
    pub fn wrap(&self, token: &str) -> String {
        let mut out = String::with_capacity(token.len() + 2);
        out.push(self.open as char);
        out.push_str(token);
        out.push(self.close as char);
        out
    }
}

impl Default for DelimiterPair {
    fn default() -> Self {
        Self::PIPE
    }
}

fn validate(c: char) -> Result<u8, DelimiterError> {
    if !c.is_ascii() {
        return Err(DelimiterError::NotAscii(c));
    }
    if c.is_ascii_alphanumeric() || c.is_ascii_whitespace() {
        return Err(DelimiterError::Ambiguous(c));
    }
    Ok(c as u8)
}

#[derive(Serialize, Deserialize)]
struct RawDelimiterPair {
    open: char,
    close: char,
}

impl TryFrom<RawDelimiterPair> for DelimiterPair {
    type Error = DelimiterError;

    fn try_from(raw: RawDelimiterPair) -> Result<Self, Self::Error> {
        Self::new(raw.open, raw.close)
    }
}

impl From<DelimiterPair> for RawDelimiterPair {
    fn from(pair: DelimiterPair) -> Self {
        Self {
            open: pair.open as char,
            close: pair.close as char,
        }
    }
}
