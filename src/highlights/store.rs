//! Highlight collections over a key-value substrate
//!
//! Every operation reads the whole collection, works on an in-memory copy and
//! writes the whole collection back. Records are kept as raw JSON between
//! read and write so entries this build cannot decode survive untouched.
//! Failures are logged and degrade to empty reads or abandoned writes.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::anchor::DEFAULT_CONTEXT_WINDOW;

use super::kv::{KeyValueStore, EMPTY_COLLECTION};
use super::types::{HighlightKind, HighlightRecord, ValidationError};
use super::StoreError;

/// Result of [`HighlightStore::save`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Appended to the collection
    Stored,
    /// A record with the same dedup key already exists
    Duplicate,
    /// Rejected by validation
    Invalid(ValidationError),
    /// The substrate could not be read or written
    Unavailable,
}

impl SaveOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, SaveOutcome::Stored)
    }
}

/// Result of [`HighlightStore::update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Merged, validated and written
    Applied(HighlightRecord),
    /// No record with that id
    Missing,
    /// The merged record has the dedup key of another stored record
    Duplicate,
    /// The merged record failed validation and was discarded
    Invalid(ValidationError),
    /// The substrate could not be read or written
    Unavailable,
}

/// One highlight collection
pub struct HighlightStore<S: KeyValueStore + ?Sized> {
    substrate: Arc<S>,
    kind: HighlightKind,
    /// Longest prefix or suffix accepted on write, in characters
    max_context: usize,
}

impl<S: KeyValueStore + ?Sized> Clone for HighlightStore<S> {
    fn clone(&self) -> Self {
        Self {
            substrate: Arc::clone(&self.substrate),
            kind: self.kind,
            max_context: self.max_context,
        }
    }
}

impl<S: KeyValueStore + ?Sized> HighlightStore<S> {
    pub fn new(substrate: Arc<S>, kind: HighlightKind) -> Self {
        Self {
            substrate,
            kind,
            max_context: DEFAULT_CONTEXT_WINDOW,
        }
    }

    pub fn with_context_window(mut self, window: usize) -> Self {
        self.max_context = window;
        self
    }

    /// The underlying substrate, shared with other collections
    pub fn substrate(&self) -> &Arc<S> {
        &self.substrate
    }

    /// Valid records belonging to `url`, in insertion order
    pub async fn get_for_document(&self, url: &str) -> Vec<HighlightRecord> {
        self.get_all()
            .await
            .into_iter()
            .filter(|record| record.url() == url)
            .collect()
    }

    /// Every valid record in the collection
    pub async fn get_all(&self) -> Vec<HighlightRecord> {
        match self.load().await {
            Ok(values) => self.decode_all(&values),
            Err(e) => {
                tracing::error!("Failed to read {} highlights: {}", self.kind.as_str(), e);
                Vec::new()
            }
        }
    }

    /// Look a record up by document and id
    pub async fn find(&self, url: &str, id: &str) -> Option<HighlightRecord> {
        self.get_for_document(url)
            .await
            .into_iter()
            .find(|record| record.id() == id)
    }

    /// Validate and append a record, skipping duplicates
    pub async fn save(&self, record: &HighlightRecord) -> SaveOutcome {
        if record.kind() != self.kind {
            let error = ValidationError::KindMismatch {
                expected: self.kind.as_str(),
                found: record.kind().as_str(),
            };
            tracing::warn!("Dropping highlight {}: {}", record.id(), error);
            return SaveOutcome::Invalid(error);
        }
        if let Err(error) = record
            .validate()
            .and_then(|()| record.check_context(self.max_context))
        {
            tracing::warn!("Dropping highlight {}: {}", record.id(), error);
            return SaveOutcome::Invalid(error);
        }

        let mut values = match self.load().await {
            Ok(values) => values,
            Err(e) => {
                tracing::error!("Failed to read {} highlights: {}", self.kind.as_str(), e);
                return SaveOutcome::Unavailable;
            }
        };

        let key = record.dedup_key();
        if self
            .decode_all(&values)
            .iter()
            .any(|existing| existing.dedup_key() == key)
        {
            tracing::debug!("Highlight already stored, skipping {}", record.id());
            return SaveOutcome::Duplicate;
        }

        let value = match record.to_value() {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to encode highlight {}: {}", record.id(), e);
                return SaveOutcome::Unavailable;
            }
        };
        values.push(value);

        match self.persist(&values).await {
            Ok(()) => {
                tracing::info!("Saved {} highlight {}", self.kind.as_str(), record.id());
                SaveOutcome::Stored
            }
            Err(e) => {
                tracing::error!("Failed to write {} highlights: {}", self.kind.as_str(), e);
                SaveOutcome::Unavailable
            }
        }
    }

    /// Decode, validate and append a raw JSON record
    pub async fn save_value(&self, value: &Value) -> SaveOutcome {
        match HighlightRecord::from_value(value, self.kind) {
            Ok(record) => self.save(&record).await,
            Err(error) => {
                tracing::warn!("Dropping invalid {} highlight: {}", self.kind.as_str(), error);
                SaveOutcome::Invalid(error)
            }
        }
    }

    /// Delete the record with `id`; returns whether one was removed
    pub async fn remove(&self, id: &str) -> bool {
        self.retain(|value| record_id(value) != Some(id)).await > 0
    }

    /// Delete every record belonging to `url`; returns how many were removed
    pub async fn clear_for_document(&self, url: &str) -> usize {
        self.retain(|value| value.get("url").and_then(Value::as_str) != Some(url))
            .await
    }

    /// Merge a JSON patch onto the record with `id`.
    ///
    /// `null` members delete fields and nested objects merge recursively. The
    /// id is never changed. The merged record must pass validation and must
    /// not collide with another record's dedup key.
    pub async fn update(&self, id: &str, patch: &Value) -> UpdateOutcome {
        let mut values = match self.load().await {
            Ok(values) => values,
            Err(e) => {
                tracing::error!("Failed to read {} highlights: {}", self.kind.as_str(), e);
                return UpdateOutcome::Unavailable;
            }
        };

        let Some(position) = values.iter().position(|value| record_id(value) == Some(id)) else {
            return UpdateOutcome::Missing;
        };

        let mut merged = values[position].clone();
        merge_patch(&mut merged, patch);
        if let Some(object) = merged.as_object_mut() {
            object.insert("id".to_string(), Value::String(id.to_string()));
        }

        let record = match HighlightRecord::from_value(&merged, self.kind)
            .and_then(|record| record.check_context(self.max_context).map(|()| record))
        {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!("Discarding invalid update to {}: {}", id, error);
                return UpdateOutcome::Invalid(error);
            }
        };

        let key = record.dedup_key();
        let collides = values
            .iter()
            .enumerate()
            .filter(|&(index, _)| index != position)
            .filter_map(|(_, value)| HighlightRecord::from_value(value, self.kind).ok())
            .any(|other| other.dedup_key() == key);
        if collides {
            tracing::debug!("Discarding update to {}: duplicates another highlight", id);
            return UpdateOutcome::Duplicate;
        }
        values[position] = merged;

        match self.persist(&values).await {
            Ok(()) => {
                tracing::info!("Updated {} highlight {}", self.kind.as_str(), id);
                UpdateOutcome::Applied(record)
            }
            Err(e) => {
                tracing::error!("Failed to write {} highlights: {}", self.kind.as_str(), e);
                UpdateOutcome::Unavailable
            }
        }
    }

    async fn retain<F>(&self, keep: F) -> usize
    where
        F: Fn(&Value) -> bool,
    {
        let mut values = match self.load().await {
            Ok(values) => values,
            Err(e) => {
                tracing::error!("Failed to read {} highlights: {}", self.kind.as_str(), e);
                return 0;
            }
        };

        let before = values.len();
        values.retain(|value| keep(value));
        let removed = before - values.len();
        if removed == 0 {
            return 0;
        }

        match self.persist(&values).await {
            Ok(()) => {
                tracing::info!("Removed {} {} highlight(s)", removed, self.kind.as_str());
                removed
            }
            Err(e) => {
                tracing::error!("Failed to write {} highlights: {}", self.kind.as_str(), e);
                0
            }
        }
    }

    async fn load(&self) -> Result<Vec<Value>, StoreError> {
        let raw = self
            .substrate
            .get_or(self.kind.storage_key(), EMPTY_COLLECTION)
            .await?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn persist(&self, values: &[Value]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(values)?;
        self.substrate.set(self.kind.storage_key(), &raw).await
    }

    fn decode_all(&self, values: &[Value]) -> Vec<HighlightRecord> {
        values
            .iter()
            .filter_map(|value| match HighlightRecord::from_value(value, self.kind) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::debug!("Skipping unreadable {} highlight: {}", self.kind.as_str(), e);
                    None
                }
            })
            .collect()
    }
}

fn record_id(value: &Value) -> Option<&str> {
    value.get("id").and_then(Value::as_str)
}

/// RFC 7396 merge
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}
