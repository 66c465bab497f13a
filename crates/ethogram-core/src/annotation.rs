//! Annotation Provider capability and the spans it produces.

use serde::{Deserialize, Serialize};

use crate::error::AnnotationError;

/// A named-entity mention from an external annotator.
///
/// Offsets are byte offsets into the observation text, end-exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSpan {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub span_type: String,
    #[serde(rename = "normalizedText", alias = "normalized_text")]
    pub normalized_text: String,
    /// Annotator that produced the span; ranks by the configured
    /// annotator order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl AnnotationSpan {
    pub fn new(start: usize, end: usize, span_type: &str, normalized_text: &str) -> Self {
        Self {
            start,
            end,
            span_type: span_type.to_string(),
            normalized_text: normalized_text.to_string(),
            annotator: None,
            confidence: None,
        }
    }

    pub fn with_annotator(mut self, annotator: &str) -> Self {
        self.annotator = Some(annotator.to_string());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Non-empty and inside a text of `text_len` bytes.
    pub fn is_within(&self, text_len: usize) -> bool {
        !self.is_empty() && self.end <= text_len
    }
}

/// External linguistic annotation (tokenisation, lemmatisation, NER).
///
/// The engine never inspects how spans are computed; it only consumes them.
pub trait AnnotationProvider: Send + Sync {
    /// Annotator name as declared in the configuration's annotator order.
    fn name(&self) -> &str;

    fn annotate(&self, text: &str) -> Result<Vec<AnnotationSpan>, AnnotationError>;
}
