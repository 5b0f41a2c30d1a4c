//! Quote-level highlight renderer
//!
//! A render pass always runs clear -> fetch -> resolve -> wrap against the
//! live tree. Anchors that no longer resolve stay in the store; they are only
//! counted and logged.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde_json::Value;

use crate::anchor::{serialize_range, AnchorResolver, ResolverConfig, DEFAULT_CONTEXT_WINDOW};
use crate::dom::{Document, NodeId};
use crate::highlights::{
    is_hex_color, HighlightRecord, HighlightStore, KeyValueStore, QuoteHighlight, SaveOutcome,
    UpdateOutcome, DEFAULT_HIGHLIGHT_COLOR,
};

use super::events::{EventSink, HighlightEvent, Position};
use super::session::{Selection, ViewSession};
use super::wrap::{unwrap_all, wrap_range, MarkerConfig, WrapSpec};

/// Substrate key of the user's preferred highlight color
pub const COLOR_PREFERENCE_KEY: &str = "local:sentence_highlight_color";

/// Summary of one render pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderReport {
    /// Wrappers removed before rendering
    pub cleared: usize,
    /// Highlights drawn
    pub rendered: usize,
    /// Stored highlights that could not be located
    pub unresolved: usize,
    /// True when the pass was dropped because another was in progress
    pub skipped: bool,
}

impl RenderReport {
    pub(crate) fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Re-entrancy guard released on drop
pub(crate) struct RenderGuard<'a>(&'a AtomicBool);

impl<'a> RenderGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Self(flag))
    }
}

impl Drop for RenderGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Draws and manages quote-level highlights for one document view at a time
pub struct HighlightRenderer<S: KeyValueStore + ?Sized> {
    store: HighlightStore<S>,
    resolver: AnchorResolver,
    marker: MarkerConfig,
    events: EventSink,
    rendering: AtomicBool,
    default_color: String,
    context_window: usize,
}

impl<S: KeyValueStore + ?Sized> HighlightRenderer<S> {
    pub fn new(store: HighlightStore<S>, events: EventSink) -> Self {
        Self {
            store,
            resolver: AnchorResolver::default(),
            marker: MarkerConfig::sentence(),
            events,
            rendering: AtomicBool::new(false),
            default_color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    pub fn with_resolver_config(mut self, config: ResolverConfig) -> Self {
        self.resolver = AnchorResolver::new(config);
        self
    }

    pub fn with_default_color(mut self, color: impl Into<String>) -> Self {
        self.default_color = color.into();
        self
    }

    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    pub fn store(&self) -> &HighlightStore<S> {
        &self.store
    }

    /// Redraw every stored highlight of the session's document.
    ///
    /// A pass started while another is running is dropped.
    pub async fn render_highlights(&self, doc: &mut Document, session: &ViewSession) -> RenderReport {
        let Some(_guard) = RenderGuard::acquire(&self.rendering) else {
            tracing::debug!("Render already in progress for {}, skipping", session.url);
            return RenderReport::skipped();
        };

        let mut report = RenderReport {
            cleared: unwrap_all(doc, &self.marker.id_attribute),
            ..RenderReport::default()
        };

        for record in self.store.get_for_document(&session.url).await {
            let Some(highlight) = record.as_sentence() else {
                continue;
            };
            if self.draw(doc, highlight) {
                report.rendered += 1;
            } else {
                report.unresolved += 1;
            }
        }

        tracing::debug!(
            "Rendered {} highlight(s) for {} ({} unresolved)",
            report.rendered,
            session.url,
            report.unresolved
        );
        report
    }

    fn draw(&self, doc: &mut Document, highlight: &QuoteHighlight) -> bool {
        let Some(resolved) = self.resolver.resolve(doc, &highlight.anchor()) else {
            tracing::warn!(
                "Could not resolve highlight {} ('{}')",
                highlight.id,
                highlight.exact
            );
            return false;
        };

        let spec = WrapSpec {
            id: &highlight.id,
            color: Some(highlight.color_or_default()),
            title: highlight.note.as_deref(),
        };
        match wrap_range(doc, &resolved.range, &self.marker, spec) {
            Ok(0) => {
                tracing::warn!("Highlight {} resolved to no visible text", highlight.id);
                false
            }
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Failed to wrap highlight {}: {}", highlight.id, e);
                false
            }
        }
    }

    /// Persist the current selection as a highlight and redraw.
    ///
    /// Returns `false` for a missing or blank selection, or when nothing was
    /// stored.
    pub async fn highlight_selection(
        &self,
        doc: &mut Document,
        session: &ViewSession,
        selection: Option<&Selection>,
    ) -> bool {
        let Some(selection) = selection.filter(|selection| !selection.is_blank()) else {
            return false;
        };
        let Some(anchor) = serialize_range(doc, &selection.range, self.context_window) else {
            tracing::debug!("Selection has no indexable text");
            return false;
        };
        if anchor.quote.exact.trim().is_empty() {
            return false;
        }

        let color = self.configured_color().await;
        let highlight = QuoteHighlight::new(&session.url, &session.title, &anchor).with_color(&color);

        match self.store.save(&HighlightRecord::Sentence(highlight)).await {
            SaveOutcome::Stored | SaveOutcome::Duplicate => {
                self.render_highlights(doc, session).await;
                true
            }
            SaveOutcome::Invalid(_) | SaveOutcome::Unavailable => false,
        }
    }

    /// The user's preferred color, else the configured default
    pub async fn configured_color(&self) -> String {
        match self.store.substrate().get(COLOR_PREFERENCE_KEY).await {
            Ok(Some(raw)) => {
                let color = serde_json::from_str::<String>(&raw).unwrap_or(raw);
                let color = color.trim();
                if is_hex_color(color) {
                    color.to_string()
                } else {
                    if !color.is_empty() {
                        tracing::warn!("Ignoring highlight color preference '{}'", color);
                    }
                    self.default_color.clone()
                }
            }
            Ok(None) => self.default_color.clone(),
            Err(e) => {
                tracing::error!("Failed to read highlight color preference: {}", e);
                self.default_color.clone()
            }
        }
    }

    /// Emit [`HighlightEvent::ShowHighlightMenu`] for a click on a highlight
    pub async fn handle_click(
        &self,
        doc: &Document,
        session: &ViewSession,
        target: NodeId,
        position: Position,
    ) -> bool {
        let Some((wrapper, anchor)) = self.lookup(doc, session, target).await else {
            return false;
        };
        self.events.emit(HighlightEvent::ShowHighlightMenu {
            anchor,
            position,
            target: wrapper,
        });
        true
    }

    /// Emit [`HighlightEvent::ShowHighlightContextMenu`] for a right-click
    pub async fn handle_context_menu(
        &self,
        doc: &Document,
        session: &ViewSession,
        target: NodeId,
        position: Position,
    ) -> bool {
        let Some((wrapper, anchor)) = self.lookup(doc, session, target).await else {
            return false;
        };
        self.events.emit(HighlightEvent::ShowHighlightContextMenu {
            anchor,
            position,
            target: wrapper,
        });
        true
    }

    async fn lookup(
        &self,
        doc: &Document,
        session: &ViewSession,
        target: NodeId,
    ) -> Option<(NodeId, QuoteHighlight)> {
        let attribute = self.marker.id_attribute.as_str();
        let wrapper = doc.closest(target, |element| element.has_attr(attribute))?;
        let id = doc.element(wrapper)?.attr(attribute)?.to_string();

        match self.store.find(&session.url, &id).await {
            Some(HighlightRecord::Sentence(highlight)) => Some((wrapper, highlight)),
            _ => {
                tracing::debug!("Clicked highlight {} is not stored", id);
                None
            }
        }
    }

    /// Delete a highlight and redraw; returns whether it existed
    pub async fn remove_highlight(&self, doc: &mut Document, session: &ViewSession, id: &str) -> bool {
        let removed = self.store.remove(id).await;
        self.render_highlights(doc, session).await;
        removed
    }

    /// Patch a highlight (color, note) and redraw when applied
    pub async fn update_highlight(
        &self,
        doc: &mut Document,
        session: &ViewSession,
        id: &str,
        patch: &Value,
    ) -> UpdateOutcome {
        let outcome = self.store.update(id, patch).await;
        if matches!(outcome, UpdateOutcome::Applied(_)) {
            self.render_highlights(doc, session).await;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::QUOTE_MARKER_ATTRIBUTE;
    use crate::dom::{parse_html, Boundary, TextRange};
    use crate::highlights::{HighlightKind, MemoryStore};
    use crate::render::wrap::wrappers;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    const ARTICLE: &str = "<article><p>The quick brown fox jumps.</p>\
        <p>The quick brown fox runs over <em>the lazy</em> dog.</p></article>";

    fn session() -> ViewSession {
        ViewSession::new("https://example.com/fox", "Fox")
    }

    fn renderer() -> (HighlightRenderer<MemoryStore>, UnboundedReceiver<HighlightEvent>) {
        let store = HighlightStore::new(Arc::new(MemoryStore::new()), HighlightKind::Sentence);
        let (events, receiver) = EventSink::channel();
        (HighlightRenderer::new(store, events), receiver)
    }

    fn text_node(doc: &Document, needle: &str) -> NodeId {
        doc.descendants(doc.root())
            .find(|&id| doc.text(id).map(|t| t.contains(needle)).unwrap_or(false))
            .unwrap()
    }

    fn select(doc: &Document, needle: &str, from: usize, to: usize) -> Selection {
        Selection::from_range(doc, TextRange::within(text_node(doc, needle), from, to))
    }

    #[tokio::test]
    async fn test_highlight_selection_persists_and_wraps() {
        let (renderer, _events) = renderer();
        let mut doc = parse_html(ARTICLE);
        let selection = select(&doc, "runs", 4, 19);

        assert!(renderer.highlight_selection(&mut doc, &session(), Some(&selection)).await);

        let stored = renderer.store().get_for_document(&session().url).await;
        assert_eq!(stored.len(), 1);
        let highlight = stored[0].as_sentence().unwrap();
        assert_eq!(highlight.exact, "quick brown fox");
        assert_eq!(highlight.color.as_deref(), Some(DEFAULT_HIGHLIGHT_COLOR));

        let marked = wrappers(&doc, QUOTE_MARKER_ATTRIBUTE);
        assert_eq!(marked.len(), 1);
        assert_eq!(doc.text_content(marked[0]), "quick brown fox");
        // Second paragraph, not the first identical phrase
        let paragraph = doc.parent(marked[0]).unwrap();
        assert!(doc.text_content(paragraph).contains("runs"));
    }

    #[tokio::test]
    async fn test_blank_or_missing_selection_is_rejected() {
        let (renderer, _events) = renderer();
        let mut doc = parse_html(ARTICLE);

        assert!(!renderer.highlight_selection(&mut doc, &session(), None).await);
        let blank = select(&doc, "jumps", 3, 4);
        assert!(!renderer.highlight_selection(&mut doc, &session(), Some(&blank)).await);
        assert!(renderer.store().get_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_render_is_idempotent() {
        let (renderer, _events) = renderer();
        let mut doc = parse_html(ARTICLE);
        let start = text_node(&doc, "runs");
        let end = text_node(&doc, "lazy");
        let selection = Selection::from_range(
            &doc,
            TextRange::new(Boundary::new(start, 20), Boundary::new(end, 3)),
        );
        assert!(renderer.highlight_selection(&mut doc, &session(), Some(&selection)).await);
        let once = doc.to_html();

        let report = renderer.render_highlights(&mut doc, &session()).await;
        assert_eq!(report.cleared, 2);
        assert_eq!(report.rendered, 1);
        assert_eq!(doc.to_html(), once);
    }

    #[tokio::test]
    async fn test_highlights_survive_reload_and_mutation() {
        let (renderer, _events) = renderer();
        let mut doc = parse_html(ARTICLE);
        let selection = select(&doc, "runs", 4, 19);
        renderer.highlight_selection(&mut doc, &session(), Some(&selection)).await;

        let mut reloaded = parse_html(
            "<main><h1>Foxes</h1><article><p>The quick brown fox jumps.</p>\
             <div><p>The quick brown fox runs over <em>the lazy</em> dog.</p></div></article></main>",
        );
        let report = renderer.render_highlights(&mut reloaded, &session()).await;
        assert_eq!(report.rendered, 1);

        let marked = wrappers(&reloaded, QUOTE_MARKER_ATTRIBUTE);
        let paragraph = reloaded.parent(marked[0]).unwrap();
        assert!(reloaded.text_content(paragraph).contains("runs"));
    }

    #[tokio::test]
    async fn test_unresolvable_highlights_are_kept() {
        let (renderer, _events) = renderer();
        let mut doc = parse_html(ARTICLE);
        let selection = select(&doc, "runs", 4, 19);
        renderer.highlight_selection(&mut doc, &session(), Some(&selection)).await;

        let mut other = parse_html("<p>Nothing in common here.</p>");
        let report = renderer.render_highlights(&mut other, &session()).await;
        assert_eq!(report.rendered, 0);
        assert_eq!(report.unresolved, 1);
        assert_eq!(renderer.store().get_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_render_is_skipped() {
        let (renderer, _events) = renderer();
        let mut doc = parse_html(ARTICLE);

        let held = RenderGuard::acquire(&renderer.rendering).unwrap();
        let report = renderer.render_highlights(&mut doc, &session()).await;
        assert!(report.skipped);
        drop(held);

        let report = renderer.render_highlights(&mut doc, &session()).await;
        assert!(!report.skipped);
    }

    #[tokio::test]
    async fn test_click_emits_menu_event() {
        let (renderer, mut events) = renderer();
        let mut doc = parse_html(ARTICLE);
        let selection = select(&doc, "jumps", 4, 9);
        renderer.highlight_selection(&mut doc, &session(), Some(&selection)).await;

        let wrapper = wrappers(&doc, QUOTE_MARKER_ATTRIBUTE)[0];
        let inner = doc.children(wrapper)[0];
        let position = Position::new(10.0, 20.0);
        assert!(renderer.handle_click(&doc, &session(), inner, position).await);
        assert!(renderer.handle_context_menu(&doc, &session(), wrapper, position).await);

        match events.recv().await.unwrap() {
            HighlightEvent::ShowHighlightMenu { anchor, target, .. } => {
                assert_eq!(anchor.exact, "quick");
                assert_eq!(target, wrapper);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(events.recv().await.unwrap().name(), "show-highlight-context-menu");

        let plain = text_node(&doc, "runs");
        assert!(!renderer.handle_click(&doc, &session(), plain, position).await);
    }

    #[tokio::test]
    async fn test_remove_and_update_redraw() {
        let (renderer, _events) = renderer();
        let mut doc = parse_html(ARTICLE);
        let selection = select(&doc, "jumps", 4, 9);
        renderer.highlight_selection(&mut doc, &session(), Some(&selection)).await;
        let id = renderer.store().get_all().await[0].id().to_string();

        let outcome = renderer
            .update_highlight(&mut doc, &session(), &id, &json!({ "color": "#BBDEFB", "note": "fast" }))
            .await;
        assert!(matches!(outcome, UpdateOutcome::Applied(_)));
        let html = doc.to_html();
        assert!(html.contains("background-color: #BBDEFB"));
        assert!(html.contains("title=\"fast\""));

        assert!(renderer.remove_highlight(&mut doc, &session(), &id).await);
        assert!(wrappers(&doc, QUOTE_MARKER_ATTRIBUTE).is_empty());
        assert_eq!(doc.to_html(), parse_html(ARTICLE).to_html());
    }

    #[tokio::test]
    async fn test_color_preference() {
        let (renderer, _events) = renderer();
        assert_eq!(renderer.configured_color().await, DEFAULT_HIGHLIGHT_COLOR);

        renderer
            .store()
            .substrate()
            .set(COLOR_PREFERENCE_KEY, "\"#C8E6C9\"")
            .await
            .unwrap();
        assert_eq!(renderer.configured_color().await, "#C8E6C9");

        renderer
            .store()
            .substrate()
            .set(COLOR_PREFERENCE_KEY, "#E1BEE7")
            .await
            .unwrap();
        assert_eq!(renderer.configured_color().await, "#E1BEE7");

        renderer
            .store()
            .substrate()
            .set(COLOR_PREFERENCE_KEY, "\"red; position: fixed\"")
            .await
            .unwrap();
        assert_eq!(renderer.configured_color().await, DEFAULT_HIGHLIGHT_COLOR);
    }
}
