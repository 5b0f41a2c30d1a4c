//! Quote context extraction

use serde::{Deserialize, Serialize};

use super::TextIndex;

/// Exact text with bounded surrounding context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextQuote {
    /// The highlighted text
    pub exact: String,
    /// Up to `window` characters before `exact`
    pub prefix: String,
    /// Up to `window` characters after `exact`
    pub suffix: String,
}

impl TextQuote {
    /// Slice `[from, to)` out of the index with `window` characters of context
    /// on each side.
    ///
    /// Returns `None` for an empty selection or an out-of-bounds request.
    pub fn extract(index: &TextIndex, from: usize, to: usize, window: usize) -> Option<Self> {
        let len = index.len();
        if from >= to || to > len {
            return None;
        }

        Some(Self {
            exact: index.slice(from, to).to_string(),
            prefix: index.slice(from.saturating_sub(window), from).to_string(),
            suffix: index.slice(to, to.saturating_add(window).min(len)).to_string(),
        })
    }
}
