//! Application state management

use std::sync::Arc;

use crate::anchor::ResolverConfig;
use crate::config::Config;
use crate::highlights::{HighlightKind, HighlightStore, KeyValueStore};
use crate::render::{EventSink, HighlightRenderer, WordHighlightRenderer};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    substrate: Arc<dyn KeyValueStore>,
}

impl AppState {
    pub fn new(config: Config, substrate: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, substrate }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the persistence substrate
    pub fn substrate(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.substrate
    }

    /// Highlight collection of the given kind
    pub fn store(&self, kind: HighlightKind) -> HighlightStore<dyn KeyValueStore> {
        HighlightStore::new(Arc::clone(&self.inner.substrate), kind)
            .with_context_window(self.inner.config.highlights.context_window)
    }

    /// Quote renderer for one request.
    ///
    /// Requests carry no interactive host, so events go to a closed channel.
    pub fn renderer(&self) -> HighlightRenderer<dyn KeyValueStore> {
        let (events, _) = EventSink::channel();
        let highlights = &self.inner.config.highlights;
        HighlightRenderer::new(self.store(HighlightKind::Sentence), events)
            .with_resolver_config(ResolverConfig {
                max_search_chars: highlights.max_search_chars,
            })
            .with_default_color(highlights.default_color.clone())
            .with_context_window(highlights.context_window)
    }

    /// Word renderer for one request
    pub fn word_renderer(&self) -> WordHighlightRenderer<dyn KeyValueStore> {
        let (events, _) = EventSink::channel();
        WordHighlightRenderer::new(self.store(HighlightKind::Word), events)
    }
}
