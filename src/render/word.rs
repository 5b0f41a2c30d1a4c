//! Word-level highlight renderer
//!
//! Word highlights are located by the structural path of their containing
//! element plus a case-insensitive search for the word inside it.

use std::sync::atomic::AtomicBool;

use chrono::Utc;

use crate::anchor::{
    in_non_content_container, StructuralPath, QUOTE_MARKER_ATTRIBUTE, WORD_MARKER_ATTRIBUTE,
};
use crate::dom::{Document, NodeId, TextRange};
use crate::highlights::{
    HighlightKind, HighlightRecord, HighlightStore, KeyValueStore, SaveOutcome, WordData,
    WordHighlight,
};

use super::events::{EventSink, HighlightEvent, Position};
use super::renderer::{RenderGuard, RenderReport};
use super::session::{Selection, ViewSession};
use super::wrap::{unwrap_all, wrap_range, MarkerConfig, WrapSpec};

/// Draws and manages word-level highlights
pub struct WordHighlightRenderer<S: KeyValueStore + ?Sized> {
    store: HighlightStore<S>,
    marker: MarkerConfig,
    events: EventSink,
    rendering: AtomicBool,
}

impl<S: KeyValueStore + ?Sized> WordHighlightRenderer<S> {
    pub fn new(store: HighlightStore<S>, events: EventSink) -> Self {
        Self {
            store,
            marker: MarkerConfig::word(),
            events,
            rendering: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &HighlightStore<S> {
        &self.store
    }

    /// Redraw every stored word of the session's document
    pub async fn render_highlights(&self, doc: &mut Document, session: &ViewSession) -> RenderReport {
        let Some(_guard) = RenderGuard::acquire(&self.rendering) else {
            tracing::debug!("Word render already in progress for {}, skipping", session.url);
            return RenderReport::skipped();
        };

        let mut report = RenderReport {
            cleared: unwrap_all(doc, &self.marker.id_attribute),
            ..RenderReport::default()
        };

        for record in self.store.get_for_document(&session.url).await {
            let Some(word) = record.as_word() else {
                continue;
            };
            let Some(range) = locate_word(doc, word) else {
                tracing::warn!("Could not locate word highlight {} ('{}')", word.id, word.word);
                report.unresolved += 1;
                continue;
            };

            let spec = WrapSpec {
                id: &word.id,
                color: None,
                title: None,
            };
            match wrap_range(doc, &range, &self.marker, spec) {
                Ok(count) if count > 0 => report.rendered += 1,
                Ok(_) => report.unresolved += 1,
                Err(e) => {
                    tracing::warn!("Failed to wrap word highlight {}: {}", word.id, e);
                    report.unresolved += 1;
                }
            }
        }
        report
    }

    /// Persist the selected word and redraw.
    ///
    /// The selection must start in a text node and contain a single word.
    pub async fn highlight_word(
        &self,
        doc: &mut Document,
        session: &ViewSession,
        selection: Option<&Selection>,
        word_data: Option<WordData>,
    ) -> bool {
        let Some(selection) = selection.filter(|selection| !selection.is_blank()) else {
            return false;
        };
        let word = selection.text.trim();
        if word.chars().any(char::is_whitespace) {
            tracing::debug!("Selection '{}' is not a single word", word);
            return false;
        }

        let start = selection.range.start;
        if !doc.is_text(start.node) {
            return false;
        }
        let Some(container) = content_parent(doc, start.node) else {
            return false;
        };
        let Some(xpath) = StructuralPath::encode(doc, container) else {
            return false;
        };

        let highlight = WordHighlight {
            id: HighlightKind::Word.generate_id(),
            word: word.to_string(),
            url: session.url.clone(),
            timestamp: Utc::now().timestamp_millis(),
            text_content: doc.text_content(container),
            xpath: xpath.to_string(),
            offset: start.offset,
            length: word.chars().count(),
            word_data,
        };

        match self.store.save(&HighlightRecord::Word(highlight)).await {
            SaveOutcome::Stored | SaveOutcome::Duplicate => {
                self.render_highlights(doc, session).await;
                true
            }
            SaveOutcome::Invalid(_) | SaveOutcome::Unavailable => false,
        }
    }

    /// Emit a word card event for a click on a word highlight
    pub async fn handle_click(
        &self,
        doc: &Document,
        session: &ViewSession,
        target: NodeId,
        position: Position,
    ) -> bool {
        let attribute = self.marker.id_attribute.as_str();
        let Some(wrapper) = doc.closest(target, |element| element.has_attr(attribute)) else {
            return false;
        };
        let Some(id) = doc.element(wrapper).and_then(|element| element.attr(attribute)) else {
            return false;
        };

        let Some(HighlightRecord::Word(word)) = self.store.find(&session.url, id).await else {
            tracing::debug!("Clicked word {} is not stored", id);
            return false;
        };

        let event = match word.word_data {
            Some(word_data) => HighlightEvent::ShowCachedWordCard { word_data, position },
            None => HighlightEvent::ShowWordCard {
                word: word.word,
                target: wrapper,
            },
        };
        self.events.emit(event);
        true
    }

    /// Delete a word highlight and redraw
    pub async fn remove_word(&self, doc: &mut Document, session: &ViewSession, id: &str) -> bool {
        let removed = self.store.remove(id).await;
        self.render_highlights(doc, session).await;
        removed
    }
}

/// Nearest ancestor of a text node that is not a highlight wrapper
fn content_parent(doc: &Document, node: NodeId) -> Option<NodeId> {
    let mut current = doc.parent(node)?;
    loop {
        let element = doc.element(current)?;
        if !element.has_attr(QUOTE_MARKER_ATTRIBUTE) && !element.has_attr(WORD_MARKER_ATTRIBUTE) {
            return Some(current);
        }
        current = doc.parent(current)?;
    }
}

/// Range of the first case-insensitive occurrence of the word inside its
/// recorded element
pub fn locate_word(doc: &Document, word: &WordHighlight) -> Option<TextRange> {
    let path: StructuralPath = word.xpath.parse().ok()?;
    let container = path.decode(doc)?;

    doc.descendants(container)
        .filter(|&id| doc.is_text(id) && !in_non_content_container(doc, id))
        .find_map(|id| {
            let text = doc.text(id)?;
            let start = find_ignore_case(text, &word.word)?;
            Some(TextRange::within(id, start, start + word.word.chars().count()))
        })
}

/// Character offset of the first case-insensitive occurrence of `needle`
fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let haystack: Vec<char> = haystack.chars().collect();
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }

    (0..=haystack.len() - needle.len()).find(|&start| {
        haystack[start..start + needle.len()]
            .iter()
            .zip(&needle)
            .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::highlights::MemoryStore;
    use crate::render::wrap::wrappers;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    const PAGE: &str = "<div><p>A moment of Serendipity struck.</p><p>More serendipity later.</p></div>";

    fn session() -> ViewSession {
        ViewSession::new("https://example.com/words", "Words")
    }

    fn renderer() -> (WordHighlightRenderer<MemoryStore>, UnboundedReceiver<HighlightEvent>) {
        let store = HighlightStore::new(Arc::new(MemoryStore::new()), HighlightKind::Word);
        let (events, receiver) = EventSink::channel();
        (WordHighlightRenderer::new(store, events), receiver)
    }

    fn select(doc: &Document, needle: &str) -> Selection {
        let node = doc
            .descendants(doc.root())
            .find(|&id| doc.text(id).map(|t| t.contains(needle)).unwrap_or(false))
            .unwrap();
        let text = doc.text(node).unwrap();
        let start = text[..text.find(needle).unwrap()].chars().count();
        Selection::from_range(
            doc,
            TextRange::within(node, start, start + needle.chars().count()),
        )
    }

    #[test]
    fn test_find_ignore_case() {
        assert_eq!(find_ignore_case("A moment of Serendipity", "serendipity"), Some(12));
        assert_eq!(find_ignore_case("ÉCOLE école", "école"), Some(0));
        assert_eq!(find_ignore_case("short", "longer needle"), None);
        assert_eq!(find_ignore_case("anything", ""), None);
    }

    #[tokio::test]
    async fn test_highlight_word_wraps_in_recorded_element() {
        let (renderer, _events) = renderer();
        let mut doc = parse_html(PAGE);
        let selection = select(&doc, "serendipity");

        assert!(renderer.highlight_word(&mut doc, &session(), Some(&selection), None).await);

        let stored = renderer.store().get_for_document(&session().url).await;
        let word = stored[0].as_word().unwrap();
        assert_eq!(word.xpath, "/html/body/div/p[2]");
        assert_eq!(word.length, 11);

        let marked = wrappers(&doc, WORD_MARKER_ATTRIBUTE);
        assert_eq!(marked.len(), 1);
        assert_eq!(doc.text_content(marked[0]), "serendipity");
        let paragraph = doc.parent(marked[0]).unwrap();
        assert!(doc.text_content(paragraph).starts_with("More"));
    }

    #[tokio::test]
    async fn test_multi_word_selection_is_rejected() {
        let (renderer, _events) = renderer();
        let mut doc = parse_html(PAGE);
        let selection = select(&doc, "moment of");
        assert!(!renderer.highlight_word(&mut doc, &session(), Some(&selection), None).await);
        assert!(!renderer.highlight_word(&mut doc, &session(), None, None).await);
    }

    #[tokio::test]
    async fn test_click_emits_cached_or_lookup_card() {
        let (renderer, mut events) = renderer();
        let mut doc = parse_html(PAGE);

        let data = WordData {
            word: "Serendipity".to_string(),
            pronunciation: "/ˌserənˈdɪpɪti/".to_string(),
            meaning: "a happy accident".to_string(),
        };
        let cached = select(&doc, "Serendipity");
        renderer
            .highlight_word(&mut doc, &session(), Some(&cached), Some(data.clone()))
            .await;
        let plain = select(&doc, "later");
        renderer.highlight_word(&mut doc, &session(), Some(&plain), None).await;

        let marked = wrappers(&doc, WORD_MARKER_ATTRIBUTE);
        assert_eq!(marked.len(), 2);
        let position = Position::new(5.0, 6.0);

        assert!(renderer.handle_click(&doc, &session(), marked[0], position).await);
        assert_eq!(
            events.recv().await.unwrap(),
            HighlightEvent::ShowCachedWordCard {
                word_data: data,
                position
            }
        );

        assert!(renderer.handle_click(&doc, &session(), marked[1], position).await);
        assert_eq!(
            events.recv().await.unwrap(),
            HighlightEvent::ShowWordCard {
                word: "later".to_string(),
                target: marked[1]
            }
        );
    }

    #[tokio::test]
    async fn test_render_is_idempotent_and_remove_clears() {
        let (renderer, _events) = renderer();
        let mut doc = parse_html(PAGE);
        let original = doc.to_html();
        let selection = select(&doc, "moment");
        renderer.highlight_word(&mut doc, &session(), Some(&selection), None).await;

        let once = doc.to_html();
        let report = renderer.render_highlights(&mut doc, &session()).await;
        assert_eq!(report.rendered, 1);
        assert_eq!(doc.to_html(), once);

        let id = renderer.store().get_all().await[0].id().to_string();
        assert!(renderer.remove_word(&mut doc, &session(), &id).await);
        assert_eq!(doc.to_html(), original);
    }
}
