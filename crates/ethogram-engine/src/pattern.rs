//! Regex rule extraction.
//!
//! Each rule yields at most one candidate per target field, taken from the
//! rule's first match in left-to-right order. A later occurrence is never
//! consulted, even when the first match leaves a target group empty.

use ethogram_core::config::CompiledRule;
use ethogram_core::{ExtractionCandidate, RuleExecutionError, SourceKind};
use tracing::{debug, warn};

/// Candidates plus the rules that could not run within their budget.
#[derive(Debug, Default)]
pub struct PatternOutput {
    pub candidates: Vec<ExtractionCandidate>,
    pub errors: Vec<RuleExecutionError>,
}

/// Apply every rule that feeds at least one field.
pub fn extract(text: &str, rules: &[CompiledRule]) -> PatternOutput {
    let mut out = PatternOutput::default();

    for rule in rules {
        if rule.targets.is_empty() {
            continue;
        }
        if text.len() > rule.max_scan_bytes {
            warn!(
                rule = %rule.name,
                len = text.len(),
                limit = rule.max_scan_bytes,
                "rule skipped: input exceeds execution budget"
            );
            out.errors.push(RuleExecutionError::BudgetExceeded {
                rule: rule.name.clone(),
                limit: rule.max_scan_bytes,
                len: text.len(),
            });
            continue;
        }

        let Some(caps) = rule.regex.captures(text) else {
            continue;
        };

        for target in &rule.targets {
            let Some(m) = caps.name(&target.group) else {
                continue;
            };
            match target.kind.coerce(m.as_str()) {
                Some(value) => out.candidates.push(ExtractionCandidate {
                    entity: target.entity.clone(),
                    field: target.field.clone(),
                    value,
                    source: SourceKind::Pattern,
                    priority: target.priority,
                    confidence: None,
                    span: Some((m.start(), m.end())),
                }),
                None => debug!(
                    rule = %rule.name,
                    field = %target.field,
                    raw = m.as_str(),
                    kind = %target.kind,
                    "capture does not coerce; treated as no match"
                ),
            }
        }
    }

    out
}
