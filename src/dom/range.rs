//! Live ranges over the document tree
//!
//! Boundary semantics follow the DOM: inside a text node the offset counts
//! characters, inside any other node it counts children.

use super::{byte_offset, Document, NodeId};

/// One end of a range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// The part of one text node covered by a range, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSegment {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
}

/// A live range between two boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRange {
    pub start: Boundary,
    pub end: Boundary,
}

impl TextRange {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    /// Range covering `[start, end)` of a single text node
    pub fn within(node: NodeId, start: usize, end: usize) -> Self {
        Self::new(Boundary::new(node, start), Boundary::new(node, end))
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Text nodes intersecting the range, in document order
    pub fn text_segments(&self, doc: &Document) -> Vec<TextSegment> {
        let order = DocumentOrder::build(doc);
        let (Some(start), Some(end)) = (order.key(doc, self.start), order.key(doc, self.end)) else {
            return Vec::new();
        };
        if start >= end {
            return Vec::new();
        }

        let mut segments = Vec::new();
        for position in start.0..=end.0.min(order.len().saturating_sub(1)) {
            let node = order.node_at(position);
            let Some(text) = doc.text(node) else {
                continue;
            };
            let length = text.chars().count();
            let from = if position == start.0 { start.1.min(length) } else { 0 };
            let to = if position == end.0 { end.1.min(length) } else { length };
            if from < to {
                segments.push(TextSegment { node, start: from, end: to });
            }
        }
        segments
    }

    /// Plain text covered by the range
    pub fn text(&self, doc: &Document) -> String {
        self.text_segments(doc)
            .into_iter()
            .filter_map(|segment| {
                let text = doc.text(segment.node)?;
                let from = byte_offset(text, segment.start);
                let to = byte_offset(text, segment.end);
                Some(&text[from..to])
            })
            .collect()
    }
}

/// Pre-order positions of every attached node, used to compare boundaries
pub struct DocumentOrder {
    order: Vec<NodeId>,
    positions: Vec<Option<usize>>,
}

impl DocumentOrder {
    pub fn build(doc: &Document) -> Self {
        let order: Vec<NodeId> = doc.descendants(doc.root()).collect();
        let mut positions = vec![None; doc.node_count()];
        for (position, id) in order.iter().enumerate() {
            positions[id.index()] = Some(position);
        }
        Self { order, positions }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.positions.get(id.index()).copied().flatten()
    }

    fn node_at(&self, position: usize) -> NodeId {
        self.order[position]
    }

    /// Comparable key for a boundary.
    ///
    /// A point inside a text node at position `p` maps to `(p, offset)`; a
    /// point before child `k` of an element maps to `(position(child k), 0)`;
    /// a point after the last child maps to the position following the
    /// element's subtree. Keys order exactly like DOM boundary points.
    pub fn key(&self, doc: &Document, boundary: Boundary) -> Option<(usize, usize)> {
        let position = self.position(boundary.node)?;
        if doc.is_text(boundary.node) {
            let length = doc.node_length(boundary.node);
            return Some((position, boundary.offset.min(length)));
        }

        let children = doc.children(boundary.node);
        match children.get(boundary.offset) {
            Some(&child) => Some((self.position(child)?, 0)),
            None => Some((self.subtree_end(doc, boundary.node)?, 0)),
        }
    }

    /// Position just past the last descendant of `id`
    fn subtree_end(&self, doc: &Document, id: NodeId) -> Option<usize> {
        let mut last = id;
        while let Some(&child) = doc.children(last).last() {
            last = child;
        }
        self.position(last).map(|position| position + 1)
    }
}
