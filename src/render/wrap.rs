//! Wrapper span injection and removal
//!
//! Highlights are drawn by splitting each intersecting text node at the range
//! boundaries and moving the covered slice into a marker `<span>`. Removal
//! unwraps every marker and merges the text back together, restoring the
//! tree the anchors were recorded against.

use std::collections::HashSet;

use crate::anchor::{in_non_content_container, QUOTE_MARKER_ATTRIBUTE, WORD_MARKER_ATTRIBUTE};
use crate::dom::{byte_offset, Document, DomError, NodeId, TextRange};

/// How wrapper spans are marked up
#[derive(Debug, Clone)]
pub struct MarkerConfig {
    /// Data attribute carrying the highlight id
    pub id_attribute: String,
    /// CSS class added to every wrapper
    pub class_name: String,
    /// Whether to write the highlight color as an inline style
    pub include_inline_styles: bool,
}

impl MarkerConfig {
    /// Markup for quote-level highlights
    pub fn sentence() -> Self {
        Self {
            id_attribute: QUOTE_MARKER_ATTRIBUTE.to_string(),
            class_name: "sentence-highlight".to_string(),
            include_inline_styles: true,
        }
    }

    /// Markup for word-level highlights
    pub fn word() -> Self {
        Self {
            id_attribute: WORD_MARKER_ATTRIBUTE.to_string(),
            class_name: "word-highlight".to_string(),
            include_inline_styles: false,
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self::sentence()
    }
}

/// Per-highlight wrapper contents
#[derive(Debug, Clone, Copy)]
pub struct WrapSpec<'a> {
    pub id: &'a str,
    pub color: Option<&'a str>,
    /// Tooltip, usually the highlight note
    pub title: Option<&'a str>,
}

/// Wrap every text slice covered by `range`; returns the number of wrappers
/// created.
///
/// Whitespace-only slices and text inside non-content containers are left
/// alone.
pub fn wrap_range(
    doc: &mut Document,
    range: &TextRange,
    marker: &MarkerConfig,
    spec: WrapSpec<'_>,
) -> Result<usize, DomError> {
    let segments = range.text_segments(doc);
    let mut wrapped = 0;

    for segment in segments {
        if in_non_content_container(doc, segment.node) {
            continue;
        }
        let Some(text) = doc.text(segment.node) else {
            continue;
        };
        let slice = &text[byte_offset(text, segment.start)..byte_offset(text, segment.end)];
        if slice.trim().is_empty() {
            continue;
        }
        let length = text.chars().count();

        let mut target = segment.node;
        if segment.end < length {
            doc.split_text(target, segment.end)?;
        }
        if segment.start > 0 {
            target = doc.split_text(target, segment.start)?;
        }

        let parent = doc.parent(target).ok_or(DomError::Detached(target))?;
        let wrapper = doc.create_element("span", wrapper_attributes(marker, spec));
        doc.insert_before(parent, wrapper, Some(target))?;
        doc.append_child(wrapper, target)?;
        wrapped += 1;
    }

    Ok(wrapped)
}

fn wrapper_attributes(marker: &MarkerConfig, spec: WrapSpec<'_>) -> Vec<(String, String)> {
    let mut attrs = vec![
        ("class".to_string(), marker.class_name.clone()),
        (marker.id_attribute.clone(), spec.id.to_string()),
    ];
    if marker.include_inline_styles {
        if let Some(color) = spec.color {
            attrs.push((
                "style".to_string(),
                format!("background-color: {}; cursor: pointer;", color),
            ));
        }
    }
    if let Some(title) = spec.title.filter(|title| !title.is_empty()) {
        attrs.push(("title".to_string(), title.to_string()));
    }
    attrs
}

/// Every wrapper carrying `attribute`, in document order
pub fn wrappers(doc: &Document, attribute: &str) -> Vec<NodeId> {
    doc.descendants(doc.root())
        .filter(|&id| {
            doc.element(id)
                .map(|element| element.has_attr(attribute))
                .unwrap_or(false)
        })
        .collect()
}

/// Remove every wrapper carrying `attribute`, splicing its children back and
/// merging the text it split; returns the number of wrappers removed.
pub fn unwrap_all(doc: &mut Document, attribute: &str) -> usize {
    let mut parents = Vec::new();
    let mut seen = HashSet::new();
    let mut removed = 0;

    for wrapper in wrappers(doc, attribute) {
        let Some(parent) = doc.parent(wrapper) else {
            continue;
        };
        match doc.unwrap(wrapper) {
            Ok(()) => {
                removed += 1;
                if seen.insert(parent) {
                    parents.push(parent);
                }
            }
            Err(e) => tracing::warn!("Failed to unwrap highlight {:?}: {}", wrapper, e),
        }
    }

    for parent in parents {
        if doc.parent(parent).is_some() || parent == doc.root() {
            doc.normalize(parent);
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_html, Boundary};

    fn text_node(doc: &Document, needle: &str) -> NodeId {
        doc.descendants(doc.root())
            .find(|&id| doc.text(id).map(|t| t.contains(needle)).unwrap_or(false))
            .unwrap()
    }

    fn spec(id: &str) -> WrapSpec<'_> {
        WrapSpec {
            id,
            color: Some("#FFF59D"),
            title: None,
        }
    }

    #[test]
    fn test_wrap_inside_single_text_node() {
        let mut doc = parse_html("<p>The quick brown fox</p>");
        let node = text_node(&doc, "quick");
        let count = wrap_range(
            &mut doc,
            &TextRange::within(node, 4, 9),
            &MarkerConfig::sentence(),
            WrapSpec {
                id: "h1",
                color: Some("#FFF59D"),
                title: Some("a note"),
            },
        )
        .unwrap();

        assert_eq!(count, 1);
        assert_eq!(
            doc.to_html(),
            "<html><head></head><body><p>The <span class=\"sentence-highlight\" \
             data-sentence-highlight-id=\"h1\" style=\"background-color: #FFF59D; cursor: pointer;\" \
             title=\"a note\">quick</span> brown fox</p></body></html>"
        );
    }

    #[test]
    fn test_wrap_spanning_nodes_creates_one_wrapper_per_node() {
        let mut doc = parse_html("<p>one <b>two</b> three</p><p>   </p><p>four</p>");
        let start = text_node(&doc, "one");
        let end = text_node(&doc, "four");
        let range = TextRange::new(Boundary::new(start, 2), Boundary::new(end, 2));

        let count = wrap_range(&mut doc, &range, &MarkerConfig::sentence(), spec("h1")).unwrap();
        assert_eq!(count, 4);
        assert_eq!(wrappers(&doc, QUOTE_MARKER_ATTRIBUTE).len(), 4);
    }

    #[test]
    fn test_non_content_text_is_not_wrapped() {
        let mut doc = parse_html("<div>before<script>var x;</script>after</div>");
        let start = text_node(&doc, "before");
        let end = text_node(&doc, "after");
        let range = TextRange::new(Boundary::new(start, 0), Boundary::new(end, 5));

        let count = wrap_range(&mut doc, &range, &MarkerConfig::sentence(), spec("h1")).unwrap();
        assert_eq!(count, 2);
        assert!(doc.to_html().contains("<script>var x;</script>"));
    }

    #[test]
    fn test_unwrap_all_restores_original_tree() {
        let html = "<p>alpha <i>beta</i> gamma</p><p>delta</p>";
        let mut doc = parse_html(html);
        let original = doc.to_html();

        let start = text_node(&doc, "alpha");
        let end = text_node(&doc, "delta");
        let range = TextRange::new(Boundary::new(start, 3), Boundary::new(end, 2));
        wrap_range(&mut doc, &range, &MarkerConfig::sentence(), spec("h1")).unwrap();
        assert_ne!(doc.to_html(), original);

        assert_eq!(unwrap_all(&mut doc, QUOTE_MARKER_ATTRIBUTE), 4);
        assert_eq!(doc.to_html(), original);
        assert_eq!(unwrap_all(&mut doc, QUOTE_MARKER_ATTRIBUTE), 0);

        let p = doc
            .descendants(doc.root())
            .find(|&id| doc.tag_name(id) == Some("p"))
            .unwrap();
        assert_eq!(doc.children(p).len(), 3);
    }

    #[test]
    fn test_unwrap_only_touches_matching_marker() {
        let mut doc = parse_html("<p>one two</p>");
        let node = text_node(&doc, "one");
        wrap_range(
            &mut doc,
            &TextRange::within(node, 0, 3),
            &MarkerConfig::word(),
            spec("w1"),
        )
        .unwrap();

        assert_eq!(unwrap_all(&mut doc, QUOTE_MARKER_ATTRIBUTE), 0);
        assert_eq!(wrappers(&doc, WORD_MARKER_ATTRIBUTE).len(), 1);
        assert!(!doc.to_html().contains("style="));
    }
}
