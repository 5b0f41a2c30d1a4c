//! Anchor resolution
//!
//! Two ordered strategies, first success wins:
//!
//! 1. Structural replay: decode the stored paths and rebuild the range at the
//!    stored offsets; accepted only when its text still equals `exact`.
//! 2. Quote search: scan the freshly indexed text for every occurrence of
//!    `exact`, scoring each by whether the stored prefix and suffix match the
//!    text around it.

use crate::dom::{Boundary, Document, TextRange};

use super::{RangeAnchor, TextAnchor, TextIndex, TextQuote};

/// Points awarded for a matching prefix or suffix
const CONTEXT_SCORE: u8 = 2;
const PERFECT_SCORE: u8 = 2 * CONTEXT_SCORE;

/// Tuning for the resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverConfig {
    /// Skip the quote search for documents whose indexed text is longer
    pub max_search_chars: Option<usize>,
}

/// Which strategy produced a range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategy {
    Structural,
    QuoteSearch,
}

/// A successful resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub range: TextRange,
    pub strategy: ResolveStrategy,
}

/// Turns stored anchors back into live ranges
#[derive(Debug, Clone, Default)]
pub struct AnchorResolver {
    config: ResolverConfig,
}

impl AnchorResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Resolve an anchor against the current tree
    pub fn resolve(&self, doc: &Document, anchor: &TextAnchor) -> Option<Resolved> {
        if anchor.quote.exact.is_empty() {
            return None;
        }

        if let Some(range) = resolve_structural(doc, &anchor.range, &anchor.quote.exact) {
            tracing::debug!("Anchor resolved by structural replay");
            return Some(Resolved {
                range,
                strategy: ResolveStrategy::Structural,
            });
        }

        let range = self.resolve_quote(doc, &anchor.quote)?;
        tracing::debug!("Anchor resolved by quote search");
        Some(Resolved {
            range,
            strategy: ResolveStrategy::QuoteSearch,
        })
    }

    /// Locate a quote by content alone
    pub fn resolve_quote(&self, doc: &Document, quote: &TextQuote) -> Option<TextRange> {
        if quote.exact.is_empty() {
            return None;
        }

        let index = TextIndex::build(doc, doc.root());
        if index.is_empty() {
            return None;
        }
        if let Some(cap) = self.config.max_search_chars {
            if index.len() > cap {
                tracing::warn!(
                    "Skipping quote search: document has {} characters (cap {})",
                    index.len(),
                    cap
                );
                return None;
            }
        }

        let found = find_best_match(index.full_text(), quote)?;
        let start = index.full_text()[..found].chars().count();
        let end = start + quote.exact.chars().count();

        let range = TextRange::new(index.boundary_at(start)?, index.boundary_at(end)?);
        if range.is_collapsed() {
            return None;
        }
        Some(range)
    }
}

/// Rebuild a range from its structural half.
///
/// Offsets are clamped to each node's length; the range is returned only if
/// its text equals `exact`.
pub fn resolve_structural(doc: &Document, anchor: &RangeAnchor, exact: &str) -> Option<TextRange> {
    let start = anchor.start_path.decode(doc)?;
    let end = anchor.end_path.decode(doc)?;

    let range = TextRange::new(
        Boundary::new(start, anchor.start_offset.min(doc.node_length(start))),
        Boundary::new(end, anchor.end_offset.min(doc.node_length(end))),
    );
    if range.is_collapsed() || range.text(doc) != exact {
        return None;
    }
    Some(range)
}

/// Byte offset of the best-scoring occurrence of `quote.exact` in `text`.
///
/// Every occurrence, overlapping ones included, is visited in order. An empty
/// stored prefix or suffix always counts as matching. Ties keep the leftmost
/// occurrence and a perfect score ends the scan.
pub fn find_best_match(text: &str, quote: &TextQuote) -> Option<usize> {
    let exact = quote.exact.as_str();
    let step = exact.chars().next()?.len_utf8();

    let mut best: Option<(usize, u8)> = None;
    let mut from = 0;

    while let Some(relative) = text.get(from..).and_then(|rest| rest.find(exact)) {
        let found = from + relative;

        let mut score = 0;
        if text[..found].ends_with(quote.prefix.as_str()) {
            score += CONTEXT_SCORE;
        }
        if text[found + exact.len()..].starts_with(quote.suffix.as_str()) {
            score += CONTEXT_SCORE;
        }

        if best.map(|(_, top)| score > top).unwrap_or(true) {
            best = Some((found, score));
            if score == PERFECT_SCORE {
                break;
            }
        }

        from = found + step;
    }

    best.map(|(found, _)| found)
}
