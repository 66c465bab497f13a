//! Annotation span extraction with overlap resolution.
//!
//! Several annotators may tag the same mention. Among overlapping spans of
//! mapped types the longer span wins; on equal length the span from the
//! higher-priority annotator wins. The remaining ordering (start offset,
//! type, text, confidence) only exists to make the choice independent of
//! the order the spans arrived in.

use std::cmp::{Ordering, Reverse};

use ethogram_core::{AnnotationSpan, CompiledConfig, ExtractionCandidate, FieldValue, SourceKind};
use tracing::debug;

/// Convert mapped, non-overlapping spans into candidates.
///
/// Spans with an empty or inverted range, an unmapped type, or blank
/// normalised text contribute nothing.
pub fn extract(spans: &[AnnotationSpan], config: &CompiledConfig) -> Vec<ExtractionCandidate> {
    let mut mapped: Vec<&AnnotationSpan> = spans
        .iter()
        .filter(|s| {
            !s.is_empty()
                && !s.normalized_text.trim().is_empty()
                && config.span_target(&s.span_type).is_some()
        })
        .collect();

    mapped.sort_by(|a, b| precedence(a, b, config));

    let mut accepted: Vec<&AnnotationSpan> = Vec::with_capacity(mapped.len());
    for span in mapped {
        if let Some(winner) = accepted.iter().find(|w| w.overlaps(span)) {
            debug!(
                dropped = %span.normalized_text,
                kept = %winner.normalized_text,
                span_type = %span.span_type,
                "overlapping span resolved"
            );
            continue;
        }
        accepted.push(span);
    }

    accepted
        .into_iter()
        .filter_map(|span| {
            let target = config.span_target(&span.span_type)?;
            Some(ExtractionCandidate {
                entity: target.entity.clone(),
                field: target.field.clone(),
                value: FieldValue::Text(span.normalized_text.trim().to_string()),
                source: SourceKind::Annotation,
                priority: target.priority,
                confidence: span.confidence,
                span: Some((span.start, span.end)),
            })
        })
        .collect()
}

/// `Less` means `a` takes precedence over `b`.
fn precedence(a: &AnnotationSpan, b: &AnnotationSpan, config: &CompiledConfig) -> Ordering {
    Reverse(a.len())
        .cmp(&Reverse(b.len()))
        .then_with(|| {
            config
                .annotator_rank(a.annotator.as_deref())
                .cmp(&config.annotator_rank(b.annotator.as_deref()))
        })
        .then_with(|| a.start.cmp(&b.start))
        .then_with(|| a.span_type.cmp(&b.span_type))
        .then_with(|| a.normalized_text.cmp(&b.normalized_text))
        .then_with(|| a.annotator.cmp(&b.annotator))
        .then_with(|| {
            let ca = a.confidence.unwrap_or(f32::NEG_INFINITY);
            let cb = b.confidence.unwrap_or(f32::NEG_INFINITY);
            cb.total_cmp(&ca)
        })
}
