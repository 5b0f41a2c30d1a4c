//! Typed interaction events
//!
//! Clicks on rendered highlights are reported to the host through an
//! unbounded channel instead of being handled here; presentation is the
//! host's concern.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::dom::NodeId;
use crate::highlights::{QuoteHighlight, WordData};

/// Pointer position in viewport coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Events emitted by the renderers
#[derive(Debug, Clone, PartialEq)]
pub enum HighlightEvent {
    /// A quote highlight was clicked
    ShowHighlightMenu {
        anchor: QuoteHighlight,
        position: Position,
        target: NodeId,
    },
    /// A quote highlight was right-clicked
    ShowHighlightContextMenu {
        anchor: QuoteHighlight,
        position: Position,
        target: NodeId,
    },
    /// A word highlight with cached dictionary data was clicked
    ShowCachedWordCard {
        word_data: WordData,
        position: Position,
    },
    /// A word highlight without cached data was clicked
    ShowWordCard { word: String, target: NodeId },
}

impl HighlightEvent {
    /// Stable event name
    pub fn name(&self) -> &'static str {
        match self {
            HighlightEvent::ShowHighlightMenu { .. } => "show-highlight-menu",
            HighlightEvent::ShowHighlightContextMenu { .. } => "show-highlight-context-menu",
            HighlightEvent::ShowCachedWordCard { .. } => "show-cached-word-card",
            HighlightEvent::ShowWordCard { .. } => "show-word-card",
        }
    }
}

/// Sending half of the event channel
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: UnboundedSender<HighlightEvent>,
}

impl EventSink {
    pub fn new(sender: UnboundedSender<HighlightEvent>) -> Self {
        Self { sender }
    }

    /// Create a sink together with its receiver
    pub fn channel() -> (Self, UnboundedReceiver<HighlightEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    /// Deliver an event; dropped silently when nobody is listening
    pub fn emit(&self, event: HighlightEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::debug!("No listener for {} event", e.0.name());
        }
    }
}
