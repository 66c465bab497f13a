//! End-to-end extraction for one observation.
//!
//! `RawInput → CandidatesExtracted → Merged → Normalized → Validated`.
//! Every stage is a pure function of the previous stage's output and one
//! configuration snapshot; nothing is retained between calls.

use std::fmt;
use std::sync::Arc;

use ethogram_core::record::ALERT_ENTITY;
use ethogram_core::{
    AlertRecord, AnnotationError, AnnotationProvider, AnnotationSpan, CompiledConfig,
    ConfigRegistry, EntityRecord, FieldValue, RuleExecutionError,
};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{merge, normalize, pattern, span, validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    RawInput,
    CandidatesExtracted,
    Merged,
    Normalized,
    Validated,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawInput => "raw_input",
            Self::CandidatesExtracted => "candidates_extracted",
            Self::Merged => "merged",
            Self::Normalized => "normalized",
            Self::Validated => "validated",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that reduced the quality of an extraction without failing it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Degradation {
    #[error(transparent)]
    Rule(#[from] RuleExecutionError),
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
}

/// Result of one extraction call.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub record: EntityRecord,
    pub alerts: Vec<AlertRecord>,
    pub degraded: Vec<Degradation>,
}

impl Extraction {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    pub fn into_parts(self) -> (EntityRecord, Vec<AlertRecord>) {
        (self.record, self.alerts)
    }

    /// Result shape handed to storage: entity → field → value, plus an
    /// `alert` list when any constraint failed. Keys are sorted.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (entity, fields) in self.record.iter() {
            let fields: Map<String, Value> = fields
                .iter()
                .map(|(name, value)| (name.clone(), field_json(value)))
                .collect();
            out.insert(entity.to_string(), Value::Object(fields));
        }
        if !self.alerts.is_empty() {
            let alerts = self
                .alerts
                .iter()
                .map(|a| {
                    json!({
                        "severity": a.severity.as_str(),
                        "message": a.message,
                        "entity": a.entity,
                        "field": a.field,
                    })
                })
                .collect();
            out.insert(ALERT_ENTITY.to_string(), Value::Array(alerts));
        }
        Value::Object(out)
    }
}

fn field_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Number(n) => json!(n),
        FieldValue::Text(s) => Value::String(s.clone()),
    }
}

/// Run every stage against `config`.
///
/// Spans that are empty or reach past the end of `text` are ignored.
pub fn extract(text: &str, spans: &[AnnotationSpan], config: &CompiledConfig) -> Extraction {
    debug!(stage = %Stage::RawInput, bytes = text.len(), spans = spans.len(), "extraction started");

    let usable: Vec<AnnotationSpan> = spans
        .iter()
        .filter(|s| s.is_within(text.len()))
        .cloned()
        .collect();
    if usable.len() < spans.len() {
        debug!(ignored = spans.len() - usable.len(), "spans outside the text ignored");
    }

    let pattern::PatternOutput { mut candidates, errors } = pattern::extract(text, config.rules());
    candidates.extend(span::extract(&usable, config));
    debug!(stage = %Stage::CandidatesExtracted, candidates = candidates.len(), "stage complete");

    let merged = merge::merge(&candidates, config);
    debug!(stage = %Stage::Merged, entities = merged.len(), "stage complete");

    let normalized = normalize::normalize(&merged, config);
    debug!(stage = %Stage::Normalized, fields = normalized.field_count(), "stage complete");

    let (record, alerts) = validate::validate(normalized, config);
    debug!(
        stage = %Stage::Validated,
        entities = record.len(),
        alerts = alerts.len(),
        degraded = !errors.is_empty(),
        "stage complete"
    );

    Extraction {
        record,
        alerts,
        degraded: errors.into_iter().map(Degradation::from).collect(),
    }
}

/// Collect spans from `providers` in order, then run [`extract`].
///
/// A failing provider contributes no spans and marks the result degraded.
pub fn extract_annotated(
    text: &str,
    providers: &[&dyn AnnotationProvider],
    config: &CompiledConfig,
) -> Extraction {
    let mut spans = Vec::new();
    let mut failures = Vec::new();

    for provider in providers {
        match provider.annotate(text) {
            Ok(found) => {
                debug!(annotator = provider.name(), spans = found.len(), "annotated");
                spans.extend(found.into_iter().map(|mut s| {
                    if s.annotator.is_none() {
                        s.annotator = Some(provider.name().to_string());
                    }
                    s
                }));
            }
            Err(e) => {
                warn!(annotator = provider.name(), error = %e, "annotator failed; continuing without it");
                failures.push(Degradation::from(e));
            }
        }
    }

    let mut extraction = extract(text, &spans, config);
    failures.append(&mut extraction.degraded);
    extraction.degraded = failures;
    extraction
}

/// Extraction bound to a [`ConfigRegistry`]. Each call takes one snapshot
/// and uses it throughout, so a concurrent publish never splits a call
/// across two configurations.
#[derive(Clone)]
pub struct Pipeline {
    registry: Arc<ConfigRegistry>,
}

impl Pipeline {
    pub fn new(registry: Arc<ConfigRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    pub fn extract(&self, text: &str, spans: &[AnnotationSpan]) -> Extraction {
        let config = self.registry.snapshot();
        extract(text, spans, &config)
    }

    pub fn extract_annotated(&self, text: &str, providers: &[&dyn AnnotationProvider]) -> Extraction {
        let config = self.registry.snapshot();
        extract_annotated(text, providers, &config)
    }
}
