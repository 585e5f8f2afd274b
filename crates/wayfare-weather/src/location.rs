//! Location normalization.
//!
//! Every cache read and write goes through a [`LocationKey`], so the same
//! human-entered string always lands on the same row.

use std::fmt;

/// A normalized location: trimmed, interior whitespace collapsed to single
/// spaces. The cache key is the lower-cased form; the display form keeps the
/// caller's casing for provider queries and placeholder readings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationKey {
    key: String,
    display: String,
}

impl LocationKey {
    /// Normalize raw input. Returns `None` for empty or whitespace-only input.
    pub fn new(raw: &str) -> Option<Self> {
        let display = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if display.is_empty() {
            return None;
        }

        Some(Self {
            key: display.to_lowercase(),
            display,
        })
    }

    /// The cache key
    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn display(&self) -> &str {
        &self.display
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}
