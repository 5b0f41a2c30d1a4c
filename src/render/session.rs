//! Per-view state handed to the renderers

use crate::anchor::{TextIndex, DEFAULT_CONTEXT_WINDOW};
use crate::dom::{Document, TextRange};

/// The document currently being viewed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSession {
    /// Key that partitions stored highlights
    pub url: String,
    pub title: String,
}

impl ViewSession {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

/// A captured user selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub range: TextRange,
    /// Selected text as the user saw it
    pub text: String,
    pub prefix_context: Option<String>,
    pub suffix_context: Option<String>,
}

impl Selection {
    /// Capture `range` with the default amount of surrounding context
    pub fn from_range(doc: &Document, range: TextRange) -> Self {
        let text = range.text(doc);
        let index = TextIndex::build(doc, doc.root());
        let start = index.global_offset(doc, range.start);
        let end = index.global_offset(doc, range.end);

        let (prefix_context, suffix_context) = if start < end && end <= index.len() {
            let before = index.slice(start.saturating_sub(DEFAULT_CONTEXT_WINDOW), start);
            let after = index.slice(
                end,
                end.saturating_add(DEFAULT_CONTEXT_WINDOW).min(index.len()),
            );
            (Some(before.to_string()), Some(after.to_string()))
        } else {
            (None, None)
        };

        Self {
            range,
            text,
            prefix_context,
            suffix_context,
        }
    }

    /// Whether the selection holds anything worth highlighting
    pub fn is_blank(&self) -> bool {
        self.range.is_collapsed() || self.text.trim().is_empty()
    }
}
