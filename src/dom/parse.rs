//! HTML parsing into the arena tree
//!
//! Uses `scraper` (html5ever) for standards-compliant tree construction, then copies
//! the resulting tree into a [`Document`]. Doctypes and processing
//! instructions are dropped; template fragments are flattened into their
//! parent.

use std::collections::HashMap;

use scraper::{Html, Node as HtmlNode};

use super::{Document, NodeId};

/// Parse a full HTML document
pub fn parse_html(html: &str) -> Document {
    let parsed = Html::parse_document(html);
    let mut document = Document::new();

    let tree_root = parsed.tree.root();
    let mut mapped = HashMap::new();
    mapped.insert(tree_root.id(), document.root());

    for node in tree_root.descendants().skip(1) {
        let Some(parent) = node
            .parent()
            .and_then(|parent| mapped.get(&parent.id()).copied())
        else {
            continue;
        };

        let created: NodeId = match node.value() {
            HtmlNode::Element(element) => document.create_element(
                element.name(),
                element
                    .attrs()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
            ),
            HtmlNode::Text(text) => document.create_text(&text.text),
            HtmlNode::Comment(comment) => document.create_comment(&comment.comment),
            HtmlNode::Document | HtmlNode::Fragment => {
                mapped.insert(node.id(), parent);
                continue;
            }
            _ => continue,
        };

        if let Err(e) = document.append_child(parent, created) {
            tracing::warn!("Dropping node while importing HTML: {}", e);
            continue;
        }
        mapped.insert(node.id(), created);
    }

    document
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builds_html_skeleton() {
        let doc = parse_html("<p>Hello <b>world</b></p>");

        let html = doc.children(doc.root())[0];
        assert_eq!(doc.tag_name(html), Some("html"));
        let tags: Vec<&str> = doc
            .children(html)
            .iter()
            .filter_map(|&id| doc.tag_name(id))
            .collect();
        assert_eq!(tags, vec!["head", "body"]);
        assert_eq!(doc.text_content(doc.root()), "Hello world");
    }

    #[test]
    fn test_parse_keeps_attributes_and_comments() {
        let doc = parse_html(r#"<div id="main" class="x"><!-- note -->text</div>"#);

        let div = doc
            .descendants(doc.root())
            .find(|&id| doc.tag_name(id) == Some("div"))
            .unwrap();
        let element = doc.element(div).unwrap();
        assert_eq!(element.attr("id"), Some("main"));
        assert_eq!(element.attr("class"), Some("x"));
        assert_eq!(doc.children(div).len(), 2);
        assert_eq!(doc.text(doc.children(div)[1]), Some("text"));
    }

    #[test]
    fn test_parse_empty_input() {
        let doc = parse_html("");
        assert_eq!(doc.text_content(doc.root()), "");
    }
}
