//! Candidate reconciliation: one value per (entity type, field).

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use ethogram_core::{CompiledConfig, EntityRecord, ExtractionCandidate};
use tracing::debug;

/// Merge candidates into a record.
///
/// Per field the winner is the candidate with the lowest priority rank,
/// then the highest confidence (absent confidence ranks lowest), then
/// `pattern` before `annotation`. Earlier text position and value order
/// settle anything left, so the result does not depend on candidate order.
///
/// Entity types with a missing required field are left out entirely.
pub fn merge(candidates: &[ExtractionCandidate], config: &CompiledConfig) -> EntityRecord {
    let mut winners: HashMap<(&str, &str), &ExtractionCandidate> = HashMap::new();

    for candidate in candidates {
        if config.field(&candidate.entity, &candidate.field).is_none() {
            debug!(
                entity = %candidate.entity,
                field = %candidate.field,
                "candidate for undeclared field ignored"
            );
            continue;
        }
        winners
            .entry((candidate.entity.as_str(), candidate.field.as_str()))
            .and_modify(|best| {
                if precedence(candidate, best) == Ordering::Less {
                    *best = candidate;
                }
            })
            .or_insert(candidate);
    }

    let mut record = EntityRecord::new();
    for entity in config.entities() {
        let fields: BTreeMap<String, _> = entity
            .fields
            .iter()
            .filter_map(|f| {
                winners
                    .get(&(entity.name.as_str(), f.name.as_str()))
                    .map(|c| (f.name.clone(), c.value.clone()))
            })
            .collect();

        if fields.is_empty() {
            continue;
        }
        if let Some(missing) = entity.required.iter().find(|r| !fields.contains_key(*r)) {
            debug!(
                entity = %entity.name,
                missing = %missing,
                extracted = fields.len(),
                "entity dropped: required field not extracted"
            );
            continue;
        }
        record.insert_entity(&entity.name, fields);
    }

    record
}

/// `Less` means `a` beats `b`.
fn precedence(a: &ExtractionCandidate, b: &ExtractionCandidate) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| {
            let ca = a.confidence.unwrap_or(f32::NEG_INFINITY);
            let cb = b.confidence.unwrap_or(f32::NEG_INFINITY);
            cb.total_cmp(&ca)
        })
        .then_with(|| a.source.cmp(&b.source))
        .then_with(|| match (a.span, b.span) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.value.total_cmp(&b.value))
}
