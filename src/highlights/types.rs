//! Persisted highlight records
//!
//! Two record shapes share the storage layer: quote-level highlights (an
//! anchor with structural and quote halves) and word-level highlights (a
//! single looked-up word). Each collection holds one shape, selected by an
//! explicit `kind` field so decoding and validation stay exhaustive.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::anchor::{RangeAnchor, StructuralPath, TextAnchor, TextQuote};

/// Predefined highlight colors
pub const HIGHLIGHT_COLORS: [&str; 8] = [
    "#FFF59D", // Yellow
    "#FFCCBC", // Orange
    "#C8E6C9", // Green
    "#BBDEFB", // Blue
    "#E1BEE7", // Purple
    "#FFCDD2", // Red
    "#B2EBF2", // Cyan
    "#D1C4E9", // Indigo
];

pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#FFF59D";

/// Whether `value` is a `#RRGGBB` color
pub fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .map(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Record shapes, one per storage collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    /// Quote-level highlight of an arbitrary selection
    Sentence,
    /// Word-level highlight of a dictionary lookup
    Word,
}

impl HighlightKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HighlightKind::Sentence => "sentence",
            HighlightKind::Word => "word",
        }
    }

    /// Key of the collection in the key-value substrate
    pub fn storage_key(self) -> &'static str {
        match self {
            HighlightKind::Sentence => "local:sentence_highlights",
            HighlightKind::Word => "local:highlight_words",
        }
    }

    /// Generate a fresh record id
    pub fn generate_id(self) -> String {
        let prefix = match self {
            HighlightKind::Sentence => "sentence_highlight",
            HighlightKind::Word => "highlight",
        };
        format!("{}_{}", prefix, Uuid::new_v4().simple())
    }
}

/// Validation failures for stored or incoming records
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Field must not be empty: {0}")]
    EmptyField(&'static str),

    #[error("Record of kind '{found}' does not belong in the '{expected}' collection")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Word highlight length must be positive")]
    ZeroLength,

    #[error("Color must be #RRGGBB, got '{0}'")]
    InvalidColor(String),

    #[error("{field} is {length} characters, longer than the {max} character context window")]
    ContextTooLong {
        field: &'static str,
        length: usize,
        max: usize,
    },
}

/// A quote-level highlight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteHighlight {
    pub id: String,
    /// Document the highlight belongs to
    pub url: String,
    /// Document title at creation time
    pub title: String,
    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(rename = "startXPath")]
    pub start_xpath: String,
    #[serde(rename = "endXPath")]
    pub end_xpath: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub exact: String,
    pub prefix: String,
    pub suffix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl QuoteHighlight {
    /// Build a new record from a serialized anchor
    pub fn new(url: &str, title: &str, anchor: &TextAnchor) -> Self {
        Self {
            id: HighlightKind::Sentence.generate_id(),
            url: url.to_string(),
            title: title.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            start_xpath: anchor.range.start_path.to_string(),
            end_xpath: anchor.range.end_path.to_string(),
            start_offset: anchor.range.start_offset,
            end_offset: anchor.range.end_offset,
            exact: anchor.quote.exact.clone(),
            prefix: anchor.quote.prefix.clone(),
            suffix: anchor.quote.suffix.clone(),
            color: None,
            note: None,
        }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    /// The anchor described by this record.
    ///
    /// Unparseable paths become empty paths, which never decode, so
    /// resolution falls through to the quote search.
    pub fn anchor(&self) -> TextAnchor {
        TextAnchor {
            range: RangeAnchor {
                start_path: self.start_xpath.parse().unwrap_or_else(|e| {
                    tracing::debug!("Ignoring start path '{}': {}", self.start_xpath, e);
                    StructuralPath::default()
                }),
                end_path: self.end_xpath.parse().unwrap_or_else(|e| {
                    tracing::debug!("Ignoring end path '{}': {}", self.end_xpath, e);
                    StructuralPath::default()
                }),
                start_offset: self.start_offset,
                end_offset: self.end_offset,
            },
            quote: TextQuote {
                exact: self.exact.clone(),
                prefix: self.prefix.clone(),
                suffix: self.suffix.clone(),
            },
        }
    }

    /// Display color, falling back to the default palette entry
    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_HIGHLIGHT_COLOR)
    }
}

/// Cached dictionary metadata for a word
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordData {
    pub word: String,
    pub pronunciation: String,
    pub meaning: String,
}

/// A word-level highlight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordHighlight {
    pub id: String,
    pub word: String,
    pub url: String,
    /// Creation time, milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Text surrounding the word, used for display and relocation
    pub text_content: String,
    /// Structural path of the element containing the word
    pub xpath: String,
    /// Offset of the word inside its text node
    pub offset: usize,
    /// Length of the word in characters
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_data: Option<WordData>,
}

/// Borrowed deduplication key; equal keys in one document mean one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DedupKey<'a> {
    Sentence {
        url: &'a str,
        start_xpath: &'a str,
        start_offset: usize,
        exact: &'a str,
        prefix: &'a str,
        suffix: &'a str,
    },
    Word {
        url: &'a str,
        xpath: &'a str,
        offset: usize,
        word: &'a str,
    },
}

/// Any persisted highlight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HighlightRecord {
    Sentence(QuoteHighlight),
    Word(WordHighlight),
}

impl HighlightRecord {
    pub fn kind(&self) -> HighlightKind {
        match self {
            HighlightRecord::Sentence(_) => HighlightKind::Sentence,
            HighlightRecord::Word(_) => HighlightKind::Word,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            HighlightRecord::Sentence(quote) => &quote.id,
            HighlightRecord::Word(word) => &word.id,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            HighlightRecord::Sentence(quote) => &quote.url,
            HighlightRecord::Word(word) => &word.url,
        }
    }

    pub fn as_sentence(&self) -> Option<&QuoteHighlight> {
        match self {
            HighlightRecord::Sentence(quote) => Some(quote),
            HighlightRecord::Word(_) => None,
        }
    }

    pub fn as_word(&self) -> Option<&WordHighlight> {
        match self {
            HighlightRecord::Word(word) => Some(word),
            HighlightRecord::Sentence(_) => None,
        }
    }

    pub fn dedup_key(&self) -> DedupKey<'_> {
        match self {
            HighlightRecord::Sentence(quote) => DedupKey::Sentence {
                url: &quote.url,
                start_xpath: &quote.start_xpath,
                start_offset: quote.start_offset,
                exact: &quote.exact,
                prefix: &quote.prefix,
                suffix: &quote.suffix,
            },
            HighlightRecord::Word(word) => DedupKey::Word {
                url: &word.url,
                xpath: &word.xpath,
                offset: word.offset,
                word: &word.word,
            },
        }
    }

    /// Check the semantic invariants serde cannot express
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id().is_empty() {
            return Err(ValidationError::EmptyField("id"));
        }
        if self.url().is_empty() {
            return Err(ValidationError::EmptyField("url"));
        }
        match self {
            HighlightRecord::Sentence(quote) => {
                if quote.exact.is_empty() {
                    return Err(ValidationError::EmptyField("exact"));
                }
                if let Some(color) = quote.color.as_deref().filter(|color| !is_hex_color(color)) {
                    return Err(ValidationError::InvalidColor(color.to_string()));
                }
            }
            HighlightRecord::Word(word) => {
                if word.word.trim().is_empty() {
                    return Err(ValidationError::EmptyField("word"));
                }
                if word.length == 0 {
                    return Err(ValidationError::ZeroLength);
                }
            }
        }
        Ok(())
    }

    /// Reject quote context longer than `max` characters on either side
    pub fn check_context(&self, max: usize) -> Result<(), ValidationError> {
        let HighlightRecord::Sentence(quote) = self else {
            return Ok(());
        };
        for (field, context) in [("prefix", &quote.prefix), ("suffix", &quote.suffix)] {
            let length = context.chars().count();
            if length > max {
                return Err(ValidationError::ContextTooLong { field, length, max });
            }
        }
        Ok(())
    }

    /// Decode and validate a raw JSON record for the `expected` collection.
    ///
    /// Records written without a `kind` field are read as the collection's
    /// kind.
    pub fn from_value(value: &Value, expected: HighlightKind) -> Result<Self, ValidationError> {
        let mut value = value.clone();
        let Some(object) = value.as_object_mut() else {
            return Err(ValidationError::Malformed("record is not an object".to_string()));
        };
        object
            .entry("kind")
            .or_insert_with(|| Value::String(expected.as_str().to_string()));

        let record: HighlightRecord = serde_json::from_value(value)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        if record.kind() != expected {
            return Err(ValidationError::KindMismatch {
                expected: expected.as_str(),
                found: record.kind().as_str(),
            });
        }
        record.validate()?;
        Ok(record)
    }

    /// Encode as a JSON object including the `kind` tag
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
