//! Vertical card display for an extraction result, and the configuration
//! summary printed by `ethogram check`.
//!
//! A card has one section per entity type in configuration order, then
//! alerts and any degradation notes.

use std::fmt::Write;

use ethogram_core::CompiledConfig;
use ethogram_engine::Extraction;

/// Render `extraction` as a card.
pub fn render_card(extraction: &Extraction, config: &CompiledConfig) -> String {
    let mut out = String::new();

    if extraction.record.is_empty() {
        out.push_str("(nothing extracted)\n\n");
    }

    for entity in config.entities() {
        let Some(values) = extraction.record.entity(&entity.name) else {
            continue;
        };
        let _ = writeln!(out, "{}", entity.name);
        for field in &entity.fields {
            if let Some(value) = values.get(&field.name) {
                let _ = writeln!(out, "  {:<18} {}", field.name, value);
            }
        }
        out.push('\n');
    }

    // ── Alerts ──

    if !extraction.alerts.is_empty() {
        out.push_str("alerts\n");
        for alert in &extraction.alerts {
            let _ = writeln!(
                out,
                "  [{}] {}.{}: {}",
                alert.severity, alert.entity, alert.field, alert.message
            );
        }
        out.push('\n');
    }

    if extraction.is_degraded() {
        out.push_str("degraded\n");
        for reason in &extraction.degraded {
            let _ = writeln!(out, "  {reason}");
        }
        out.push('\n');
    }

    out
}

/// Counts, per-entity field lists, constraints with their alert templates,
/// and dictionary sizes.
pub fn render_summary(config: &CompiledConfig) -> String {
    let mut out = String::new();
    let fields = config.entities().iter().flat_map(|e| &e.fields);
    let _ = writeln!(
        out,
        "{} entity types, {} fields ({} constrained), {} rules, {} annotators",
        config.entities().len(),
        fields.clone().count(),
        fields.clone().filter(|f| f.constraint.is_some()).count(),
        config.rules().len(),
        config.annotators().len()
    );

    for entity in config.entities() {
        let names: Vec<&str> = entity.fields.iter().map(|f| f.name.as_str()).collect();
        let _ = writeln!(out, "  {:<14} {}", entity.name, names.join(", "));
    }

    for entity in config.entities() {
        for field in &entity.fields {
            if let Some(constraint) = &field.constraint {
                let _ = writeln!(
                    out,
                    "  check {}.{}: {} [{}] \"{}\"",
                    entity.name,
                    field.name,
                    constraint,
                    field.severity,
                    field.message.as_str()
                );
            }
            if let Some(name) = &field.dictionary
                && let Some(dict) = config.dictionary(name)
            {
                let size = if dict.is_empty() {
                    "empty".to_string()
                } else {
                    format!("{} entries", dict.len())
                };
                let _ = writeln!(out, "  dictionary {}.{}: {name} ({size})", entity.name, field.name);
            }
        }
    }

    out
}
