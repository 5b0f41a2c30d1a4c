//! Flattened text index over a document subtree
//!
//! Every eligible text node is concatenated into one string and its span is
//! recorded in a shared character offset space. The index is cheap to build
//! and never cached: any mutation of the tree invalidates its offsets.

use crate::dom::{byte_offset, Boundary, Document, DocumentOrder, NodeId};

use super::QUOTE_MARKER_ATTRIBUTE;

/// Elements whose text is never indexed
pub const NON_CONTENT_CONTAINERS: &[&str] = &["script", "style", "noscript", "iframe"];

/// Span of one text node in the global offset space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextIndexEntry {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
}

/// Concatenated text plus the node spans that produced it
#[derive(Debug, Clone, Default)]
pub struct TextIndex {
    full_text: String,
    entries: Vec<TextIndexEntry>,
}

impl TextIndex {
    /// Index all eligible text below `root` in document order
    pub fn build(doc: &Document, root: NodeId) -> Self {
        let mut full_text = String::new();
        let mut entries = Vec::new();
        let mut position = 0;

        for node in doc.descendants(root) {
            let Some(text) = doc.text(node) else {
                continue;
            };
            if text.is_empty() || is_excluded(doc, node) {
                continue;
            }

            let start = position;
            position += text.chars().count();
            entries.push(TextIndexEntry {
                node,
                start,
                end: position,
            });
            full_text.push_str(text);
        }

        Self { full_text, entries }
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn entries(&self) -> &[TextIndexEntry] {
        &self.entries
    }

    /// Length of the indexed text in characters
    pub fn len(&self) -> usize {
        self.entries.last().map(|entry| entry.end).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Text between two global offsets, clamped to the index
    pub fn slice(&self, from: usize, to: usize) -> &str {
        let from = byte_offset(&self.full_text, from);
        let to = byte_offset(&self.full_text, to);
        if from >= to {
            return "";
        }
        &self.full_text[from..to]
    }

    pub fn entry_for(&self, node: NodeId) -> Option<&TextIndexEntry> {
        self.entries.iter().find(|entry| entry.node == node)
    }

    /// Map a live boundary into the global offset space.
    ///
    /// Text boundaries add their clamped offset to the node's start; text
    /// nodes missing from the index map to 0. Element boundaries count every
    /// indexed character that ends at or before the boundary point.
    pub fn global_offset(&self, doc: &Document, boundary: Boundary) -> usize {
        if doc.is_text(boundary.node) {
            return match self.entry_for(boundary.node) {
                Some(entry) => entry.start + boundary.offset.min(entry.end - entry.start),
                None => 0,
            };
        }

        let order = DocumentOrder::build(doc);
        let Some(point) = order.key(doc, boundary) else {
            return 0;
        };

        let mut total = 0;
        for entry in &self.entries {
            let Some(position) = order.position(entry.node) else {
                break;
            };
            if (position, entry.end - entry.start) <= point {
                total += entry.end - entry.start;
            } else {
                break;
            }
        }
        total
    }

    /// Map a global offset back to a text boundary.
    ///
    /// The offset is clamped into `[0, len]` and lands in the first entry
    /// whose end is at or past it. Returns `None` for an empty index.
    pub fn boundary_at(&self, offset: usize) -> Option<Boundary> {
        let last = self.entries.last()?;
        let offset = offset.min(last.end);

        let entry = self
            .entries
            .iter()
            .find(|entry| offset <= entry.end)
            .unwrap_or(last);
        Some(Boundary::new(entry.node, offset - entry.start))
    }
}

/// Whether a text node is outside the indexable content.
///
/// Text with no parent element, text inside non-content containers and text
/// already wrapped by a quote highlight are all excluded.
pub fn is_excluded(doc: &Document, node: NodeId) -> bool {
    let Some(parent) = doc.parent(node).filter(|&parent| doc.is_element(parent)) else {
        return true;
    };
    in_non_content_container(doc, parent)
        || doc
            .closest(parent, |element| element.has_attr(QUOTE_MARKER_ATTRIBUTE))
            .is_some()
}

/// Whether `node` sits inside script, style or another non-content container
pub fn in_non_content_container(doc: &Document, node: NodeId) -> bool {
    doc.closest(node, |element| {
        NON_CONTENT_CONTAINERS.contains(&element.tag.as_str())
    })
    .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn test_entries_are_contiguous() {
        let doc = parse_html("<p>Hello <em>big</em> world</p><p>again</p>");
        let index = TextIndex::build(&doc, doc.root());

        assert_eq!(index.full_text(), "Hello big worldagain");
        assert_eq!(index.len(), index.full_text().chars().count());
        let mut previous_end = 0;
        for entry in index.entries() {
            assert_eq!(entry.start, previous_end);
            assert!(entry.end > entry.start);
            previous_end = entry.end;
        }
    }

    #[test]
    fn test_excludes_scripts_styles_and_highlights() {
        let doc = parse_html(
            "<style>p{}</style><p>a<script>var x;</script>b</p>\
             <p><span data-sentence-highlight-id=\"h1\">hidden</span>c</p>\
             <noscript>nope</noscript><iframe>frame</iframe>",
        );
        let index = TextIndex::build(&doc, doc.root());
        assert_eq!(index.full_text(), "abc");
    }

    #[test]
    fn test_empty_document() {
        let doc = parse_html("");
        let index = TextIndex::build(&doc, doc.root());
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert_eq!(index.boundary_at(3), None);
    }

    #[test]
    fn test_global_offset_for_text_and_element_boundaries() {
        let doc = parse_html("<p>one</p><p>two</p>");
        let index = TextIndex::build(&doc, doc.root());
        let second = index.entries()[1].node;
        assert_eq!(index.global_offset(&doc, Boundary::new(second, 2)), 5);
        assert_eq!(index.global_offset(&doc, Boundary::new(second, 99)), 6);

        let body = doc.parent(doc.parent(second).unwrap()).unwrap();
        assert_eq!(index.global_offset(&doc, Boundary::new(body, 1)), 3);
        assert_eq!(index.global_offset(&doc, Boundary::new(body, 2)), 6);
    }

    #[test]
    fn test_boundary_at_clamps() {
        let doc = parse_html("<p>abc</p><p>def</p>");
        let index = TextIndex::build(&doc, doc.root());
        let first = index.entries()[0].node;
        let second = index.entries()[1].node;

        assert_eq!(index.boundary_at(3), Some(Boundary::new(first, 3)));
        assert_eq!(index.boundary_at(4), Some(Boundary::new(second, 1)));
        assert_eq!(index.boundary_at(100), Some(Boundary::new(second, 3)));
    }

    #[test]
    fn test_slice_counts_characters() {
        let doc = parse_html("<p>naïve café</p>");
        let index = TextIndex::build(&doc, doc.root());
        assert_eq!(index.slice(6, 10), "café");
        assert_eq!(index.slice(8, 3), "");
    }
}
