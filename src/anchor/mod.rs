//! Anchor engine
//!
//! Turns a live selection into a durable descriptor and back:
//!
//! - [`TextIndex`]: flattened text with per-node spans
//! - [`StructuralPath`]: root-relative sibling-indexed node addresses
//! - [`TextQuote`]: exact text plus bounded prefix/suffix context
//! - [`AnchorResolver`]: structural replay with quote-search fallback
//!
//! An anchor carries both halves so that an unchanged document resolves in
//! O(path length) while an edited one can still be matched by content.

mod path;
mod quote;
mod resolver;
mod text_index;

pub use path::{PathParseError, PathStep, StructuralPath};
pub use quote::TextQuote;
pub use resolver::{
    find_best_match, resolve_structural, AnchorResolver, ResolveStrategy, Resolved,
    ResolverConfig,
};
pub use text_index::{
    in_non_content_container, is_excluded, TextIndex, TextIndexEntry, NON_CONTENT_CONTAINERS,
};

use crate::dom::{Document, TextRange};

/// Attribute marking a rendered quote highlight wrapper
pub const QUOTE_MARKER_ATTRIBUTE: &str = "data-sentence-highlight-id";

/// Attribute marking a rendered word highlight wrapper
pub const WORD_MARKER_ATTRIBUTE: &str = "data-highlight-id";

/// Characters of context captured on each side of a quote
pub const DEFAULT_CONTEXT_WINDOW: usize = 30;

/// Structural half of an anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeAnchor {
    pub start_path: StructuralPath,
    pub end_path: StructuralPath,
    /// Offset inside the start container (characters or child index)
    pub start_offset: usize,
    /// Offset inside the end container (characters or child index)
    pub end_offset: usize,
}

/// A complete anchor: structural half plus quote half
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAnchor {
    pub range: RangeAnchor,
    pub quote: TextQuote,
}

/// Describe a live range as a durable anchor.
///
/// Returns `None` when the document has no indexable text, when either
/// container has no structural path, or when the range covers no indexed
/// text.
pub fn serialize_range(doc: &Document, range: &TextRange, window: usize) -> Option<TextAnchor> {
    let index = TextIndex::build(doc, doc.root());
    if index.is_empty() {
        return None;
    }

    let start_path = StructuralPath::encode(doc, range.start.node)?;
    let end_path = StructuralPath::encode(doc, range.end.node)?;

    let start = index.global_offset(doc, range.start);
    let end = index.global_offset(doc, range.end);
    let quote = TextQuote::extract(&index, start.min(end), start.max(end), window)?;

    Some(TextAnchor {
        range: RangeAnchor {
            start_path,
            end_path,
            start_offset: range.start.offset,
            end_offset: range.end.offset,
        },
        quote,
    })
}
