//! Structural paths
//!
//! Addresses a node by the route from the document root, XPath style:
//!
//! ```text
//! path   = ("/" step)+
//! step   = tag ["[" index "]"] | "text()" ["[" index "]"]
//! index  = 1-based position among same-kind siblings
//! ```
//!
//! Element steps count preceding siblings with the same tag; text steps count
//! preceding text siblings only. An index of 1 is omitted for elements and
//! always written for text steps.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::dom::{Document, NodeData, NodeId};

/// Path parsing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathParseError {
    #[error("Empty path")]
    Empty,

    #[error("Path must start with '/'")]
    MissingLeadingSlash,

    #[error("Empty step at position {0}")]
    EmptyStep(usize),

    #[error("Invalid index in step '{0}'")]
    InvalidIndex(String),

    #[error("Invalid tag name in step '{0}'")]
    InvalidTag(String),
}

/// One step of a structural path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// The `index`-th child element named `tag`
    Element { tag: String, index: usize },
    /// The `index`-th child text node
    Text { index: usize },
}

/// Root-relative, sibling-indexed route to a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StructuralPath {
    steps: Vec<PathStep>,
}

impl StructuralPath {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Compute the path of `node`.
    ///
    /// Only elements and text nodes attached to the document root have a
    /// path; anything else yields `None`.
    pub fn encode(doc: &Document, node: NodeId) -> Option<Self> {
        let mut steps = Vec::new();
        let mut current = node;

        loop {
            if current == doc.root() {
                break;
            }
            let parent = doc.parent(current)?;
            let siblings = doc.children(parent);
            let position = siblings.iter().position(|&id| id == current)?;
            let preceding = &siblings[..position];

            let step = match doc.data(current)? {
                NodeData::Text(_) => PathStep::Text {
                    index: 1 + preceding.iter().filter(|&&id| doc.is_text(id)).count(),
                },
                NodeData::Element(element) => PathStep::Element {
                    tag: element.tag.clone(),
                    index: 1 + preceding
                        .iter()
                        .filter(|&&id| doc.tag_name(id) == Some(element.tag.as_str()))
                        .count(),
                },
                _ => return None,
            };
            steps.push(step);
            current = parent;
        }

        if steps.is_empty() {
            return None;
        }
        steps.reverse();
        Some(Self { steps })
    }

    /// Walk the path down from the document root
    pub fn decode(&self, doc: &Document) -> Option<NodeId> {
        if self.steps.is_empty() {
            return None;
        }

        let mut current = doc.root();
        for step in &self.steps {
            let children = doc.children(current);
            current = match step {
                PathStep::Text { index } => children
                    .iter()
                    .copied()
                    .filter(|&id| doc.is_text(id))
                    .nth(index.checked_sub(1)?)?,
                PathStep::Element { tag, index } => children
                    .iter()
                    .copied()
                    .filter(|&id| doc.tag_name(id) == Some(tag.as_str()))
                    .nth(index.checked_sub(1)?)?,
            };
        }
        Some(current)
    }
}

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            match step {
                PathStep::Text { index } => write!(f, "/text()[{}]", index)?,
                PathStep::Element { tag, index } if *index == 1 => write!(f, "/{}", tag)?,
                PathStep::Element { tag, index } => write!(f, "/{}[{}]", tag, index)?,
            }
        }
        Ok(())
    }
}

impl FromStr for StructuralPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathParseError::Empty);
        }
        let rest = s
            .strip_prefix('/')
            .ok_or(PathParseError::MissingLeadingSlash)?;

        let mut steps = Vec::new();
        for (position, raw) in rest.split('/').enumerate() {
            if raw.is_empty() {
                return Err(PathParseError::EmptyStep(position));
            }
            steps.push(parse_step(raw)?);
        }
        Ok(Self { steps })
    }
}

fn parse_step(raw: &str) -> Result<PathStep, PathParseError> {
    let (name, index) = match raw.find('[') {
        Some(open) => {
            let inner = raw[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| PathParseError::InvalidIndex(raw.to_string()))?;
            let index: usize = inner
                .parse()
                .map_err(|_| PathParseError::InvalidIndex(raw.to_string()))?;
            if index == 0 {
                return Err(PathParseError::InvalidIndex(raw.to_string()));
            }
            (&raw[..open], index)
        }
        None => (raw, 1),
    };

    if name == "text()" {
        return Ok(PathStep::Text { index });
    }
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
    {
        return Err(PathParseError::InvalidTag(raw.to_string()));
    }
    Ok(PathStep::Element {
        tag: name.to_ascii_lowercase(),
        index,
    })
}
