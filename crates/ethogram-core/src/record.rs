//! Per-observation records: candidates, the merged entity record, and alerts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// Entity-type name reserved for synthesized alerts in the result shape.
pub const ALERT_ENTITY: &str = "alert";

/// Where a candidate came from.
///
/// Ordering doubles as the merge tie-break: `Pattern` sorts before
/// `Annotation` and wins when everything else is equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pattern,
    Annotation,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Annotation => "annotation",
        }
    }
}

/// An unmerged field value proposed by one extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionCandidate {
    pub entity: String,
    pub field: String,
    pub value: FieldValue,
    pub source: SourceKind,
    /// Position of the producing extractor in the field's extractor list;
    /// lower ranks win.
    pub priority: usize,
    pub confidence: Option<f32>,
    /// Byte range in the observation text.
    pub span: Option<(usize, usize)>,
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A constraint violation. Additive output; never replaces the source field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub severity: Severity,
    pub message: String,
    pub entity: String,
    pub field: String,
}

/// Final field values keyed by entity type, then field name.
///
/// Backed by ordered maps so serialisation is byte-identical across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRecord {
    entities: BTreeMap<String, BTreeMap<String, FieldValue>>,
}

impl EntityRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of entity types present.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn entity(&self, entity: &str) -> Option<&BTreeMap<String, FieldValue>> {
        self.entities.get(entity)
    }

    pub fn get(&self, entity: &str, field: &str) -> Option<&FieldValue> {
        self.entities.get(entity).and_then(|fields| fields.get(field))
    }

    /// Set a field value, creating the entity entry on first use.
    pub fn insert(&mut self, entity: &str, field: &str, value: FieldValue) {
        self.entities
            .entry(entity.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    /// Insert a whole entity. Empty field maps are not stored.
    pub fn insert_entity(&mut self, entity: &str, fields: BTreeMap<String, FieldValue>) {
        if !fields.is_empty() {
            self.entities.insert(entity.to_string(), fields);
        }
    }

    /// Iterate entity types in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, FieldValue>)> {
        self.entities.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Total number of fields across all entity types.
    pub fn field_count(&self) -> usize {
        self.entities.values().map(BTreeMap::len).sum()
    }
}
