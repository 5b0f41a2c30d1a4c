//! Live document tree
//!
//! A small mutable DOM used as the render target for highlights:
//!
//! - [`Document`]: arena tree of element, text and comment nodes
//! - [`parse_html`]: build a document from HTML text
//! - [`Document::to_html`]: serialize it back
//! - [`TextRange`]: a live range with DOM boundary semantics

mod node;
mod parse;
mod range;
mod serialize;

pub use node::{Descendants, Document, ElementData, Node, NodeData, NodeId};
pub use parse::parse_html;
pub use range::{Boundary, DocumentOrder, TextRange, TextSegment};

pub(crate) use node::byte_offset;

use thiserror::Error;

/// Errors raised by tree mutations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("Node does not exist: {0:?}")]
    InvalidNode(NodeId),

    #[error("Node is not a text node: {0:?}")]
    NotText(NodeId),

    #[error("Node has no parent: {0:?}")]
    Detached(NodeId),

    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("Offset {offset} is out of bounds for {node:?} (length {length})")]
    OffsetOutOfBounds {
        node: NodeId,
        offset: usize,
        length: usize,
    },

    #[error("Hierarchy request error: {0}")]
    HierarchyRequest(String),
}
