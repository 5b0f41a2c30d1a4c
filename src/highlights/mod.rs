//! Highlight persistence
//!
//! Validated, deduplicated highlight records partitioned by document URL,
//! stored as JSON arrays in a [`KeyValueStore`].

mod kv;
mod store;
mod types;

pub use kv::{KeyValueStore, MemoryStore, SqliteStore, EMPTY_COLLECTION};
pub use store::{HighlightStore, SaveOutcome, UpdateOutcome};
pub use types::{
    is_hex_color, DedupKey, HighlightKind, HighlightRecord, QuoteHighlight, ValidationError,
    WordData, WordHighlight, DEFAULT_HIGHLIGHT_COLOR, HIGHLIGHT_COLORS,
};

use thiserror::Error;

/// Substrate and encoding failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Substrate(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
