//! Constraint evaluation and alert synthesis.

use ethogram_core::{AlertRecord, CompiledConfig, EntityRecord};
use tracing::debug;

/// Evaluate every constrained field present in `record`.
///
/// Fields are checked independently in configuration order and each
/// failing field yields exactly one alert. A value that is not a number
/// cannot satisfy any comparison and therefore always fails. The record
/// itself is returned untouched.
pub fn validate(record: EntityRecord, config: &CompiledConfig) -> (EntityRecord, Vec<AlertRecord>) {
    let mut alerts = Vec::new();

    for entity in config.entities() {
        let Some(values) = record.entity(&entity.name) else {
            continue;
        };
        for field in &entity.fields {
            let (Some(constraint), Some(value)) = (&field.constraint, values.get(&field.name)) else {
                continue;
            };
            let satisfied = value.as_number().is_some_and(|n| constraint.evaluate(n));
            if satisfied {
                continue;
            }

            let observed = value.to_string();
            debug!(
                entity = %entity.name,
                field = %field.name,
                value = %observed,
                constraint = %constraint,
                severity = %field.severity,
                "constraint failed"
            );
            alerts.push(AlertRecord {
                severity: field.severity,
                message: field.message.render(&entity.name, &field.name, &observed),
                entity: entity.name.clone(),
                field: field.name.clone(),
            });
        }
    }

    (record, alerts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethogram_core::{ConfigSource, FieldValue, Severity};

    fn builtin() -> CompiledConfig {
        CompiledConfig::builtin().unwrap()
    }

    fn vitals(temperature: f64, weight: f64) -> EntityRecord {
        let mut record = EntityRecord::new();
        record.insert("vitals", "temperature_c", FieldValue::Number(temperature));
        record.insert("vitals", "weight_kg", FieldValue::Number(weight));
        record
    }

    #[test]
    fn high_temperature_raises_warning() {
        let mut record = EntityRecord::new();
        record.insert("vitals", "temperature_c", FieldValue::Number(42.0));
        let config = CompiledConfig::compile(
            &ConfigSource::from_json(
                r#"{"entities": [{"name": "vitals", "fields": ["temperature_c"],
                    "validators": {"temperature_c": ">= 30 & <= 41"}}]}"#,
            )
            .unwrap(),
        )
        .unwrap();

        let (out, alerts) = validate(record.clone(), &config);
        assert_eq!(out, record);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert_eq!(alerts[0].entity, "vitals");
        assert_eq!(alerts[0].field, "temperature_c");
        assert!(alerts[0].message.contains("42.0"), "{}", alerts[0].message);
        assert!(alerts[0].message.contains("temperature_c"));
    }

    #[test]
    fn builtin_template_renders_value() {
        let (_, alerts) = validate(vitals(46.5, 850.0), &builtin());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "Abnormal temperature: 46.5°C");
    }

    #[test]
    fn in_range_values_pass() {
        let (_, alerts) = validate(vitals(42.0, 850.0), &builtin());
        assert!(alerts.is_empty());
        let (_, alerts) = validate(vitals(30.0, 10000.0), &builtin());
        assert!(alerts.is_empty());
    }

    #[test]
    fn each_failing_field_alerts_once() {
        let (out, alerts) = validate(vitals(29.9, 0.05), &builtin());
        let fields: Vec<_> = alerts.iter().map(|a| a.field.as_str()).collect();
        assert_eq!(fields, vec!["temperature_c", "weight_kg"]);
        assert_eq!(out, vitals(29.9, 0.05));
    }

    #[test]
    fn non_numeric_value_fails_its_constraint() {
        let mut record = EntityRecord::new();
        record.insert("vitals", "temperature_c", FieldValue::Text("высокая".into()));
        let (_, alerts) = validate(record, &builtin());
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.contains("высокая"));
    }

    #[test]
    fn disjunction_and_severity_from_config() {
        let config = CompiledConfig::compile(
            &ConfigSource::from_json(
                r#"{"entities": [{"name": "vitals", "fields": [
                    {"name": "pulse", "kind": "number", "severity": "critical",
                     "message": "{entity}.{field} out of range ({value})"}
                ], "validators": {"pulse": "< 20 | > 200"}}]}"#,
            )
            .unwrap(),
        )
        .unwrap();

        let mut record = EntityRecord::new();
        record.insert("vitals", "pulse", FieldValue::Number(80.0));
        let (_, alerts) = validate(record, &config);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].message, "vitals.pulse out of range (80.0)");

        let mut record = EntityRecord::new();
        record.insert("vitals", "pulse", FieldValue::Number(250.0));
        assert!(validate(record, &config).1.is_empty());
    }

    #[test]
    fn unconstrained_and_absent_fields_ignored() {
        let mut record = EntityRecord::new();
        record.insert("animal", "species", FieldValue::Text("giraffe".into()));
        let (out, alerts) = validate(record.clone(), &builtin());
        assert!(alerts.is_empty());
        assert_eq!(out, record);
    }
}
