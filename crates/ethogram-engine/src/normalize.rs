//! Canonicalisation of merged values.

use std::collections::BTreeMap;

use ethogram_core::{CompiledConfig, EntityRecord, FieldValue};
use tracing::trace;

/// Canonicalise every field of `record`.
///
/// Text values of a field with a dictionary are looked up case-insensitively
/// and replaced on a hit. Afterwards `number` and `date` fields still
/// holding text are coerced; anything that does not coerce, or belongs to a
/// field the configuration does not declare, passes through unchanged.
pub fn normalize(record: &EntityRecord, config: &CompiledConfig) -> EntityRecord {
    let mut out = EntityRecord::new();

    for (entity, fields) in record.iter() {
        let normalized: BTreeMap<String, FieldValue> = fields
            .iter()
            .map(|(field, value)| {
                let value = match config.field(entity, field) {
                    Some(def) => {
                        let looked_up = def
                            .dictionary
                            .as_deref()
                            .and_then(|name| config.dictionary(name))
                            .and_then(|dict| {
                                let raw = value.as_text()?;
                                let canonical = dict.lookup(raw)?;
                                trace!(entity, field = %field, raw, canonical, "dictionary hit");
                                Some(FieldValue::Text(canonical.to_string()))
                            });
                        def.kind.normalize(looked_up.as_ref().unwrap_or(value))
                    }
                    None => value.clone(),
                };
                (field.clone(), value)
            })
            .collect();
        out.insert_entity(entity, normalized);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethogram_core::ConfigSource;
    use proptest::prelude::*;

    fn builtin() -> CompiledConfig {
        CompiledConfig::builtin().unwrap()
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.into())
    }

    #[test]
    fn species_dictionary_hit() {
        let mut record = EntityRecord::new();
        record.insert("animal", "species", text("жираф"));
        let out = normalize(&record, &builtin());
        assert_eq!(out.get("animal", "species"), Some(&text("giraffe")));
    }

    #[test]
    fn dictionary_lookup_ignores_case() {
        let mut record = EntityRecord::new();
        record.insert("animal", "species", text("Жирафа"));
        let out = normalize(&record, &builtin());
        assert_eq!(out.get("animal", "species"), Some(&text("giraffe")));
    }

    #[test]
    fn unmapped_value_passes_through_verbatim() {
        let mut record = EntityRecord::new();
        record.insert("animal", "species", text("Окапи"));
        let out = normalize(&record, &builtin());
        assert_eq!(out.get("animal", "species"), Some(&text("Окапи")));
    }

    #[test]
    fn string_numbers_coerced_with_decimal_comma() {
        let mut record = EntityRecord::new();
        record.insert("vitals", "temperature_c", text(" 38,4 "));
        record.insert("vitals", "weight_kg", FieldValue::Number(850.0));
        let out = normalize(&record, &builtin());
        assert_eq!(out.get("vitals", "temperature_c"), Some(&FieldValue::Number(38.4)));
        assert_eq!(out.get("vitals", "weight_kg"), Some(&FieldValue::Number(850.0)));
    }

    #[test]
    fn uncoercible_number_passes_through() {
        let mut record = EntityRecord::new();
        record.insert("vitals", "temperature_c", text("высокая"));
        let out = normalize(&record, &builtin());
        assert_eq!(out.get("vitals", "temperature_c"), Some(&text("высокая")));
    }

    #[test]
    fn dates_become_iso() {
        let mut record = EntityRecord::new();
        record.insert("observation", "date", text("05-06-2024"));
        let out = normalize(&record, &builtin());
        assert_eq!(out.get("observation", "date"), Some(&text("2024-06-05")));
    }

    #[test]
    fn undeclared_fields_untouched() {
        let mut record = EntityRecord::new();
        record.insert("animal", "mood", text("Жираф"));
        record.insert("weather", "sky", text("ясно"));
        let out = normalize(&record, &builtin());
        assert_eq!(out, record);
    }

    #[test]
    fn empty_record() {
        assert!(normalize(&EntityRecord::new(), &builtin()).is_empty());
    }

    fn config() -> CompiledConfig {
        CompiledConfig::compile(
            &ConfigSource::from_json(
                r#"{
                    "entities": [{"name": "e", "fields": [
                        {"name": "t", "dictionary": "d"},
                        {"name": "n", "kind": "number", "dictionary": "d"},
                        {"name": "when", "kind": "date"}
                    ]}],
                    "dictionaries": {"d": {"a": "b", "B": "b", "c": "1,5", "x": "y"}}
                }"#,
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn arb_value() -> impl Strategy<Value = FieldValue> {
        prop_oneof![
            (-1000.0f64..1000.0).prop_map(FieldValue::Number),
            "[abcxyAB ,.0-9-]{0,6}".prop_map(FieldValue::Text),
        ]
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(
            fields in prop::collection::btree_map(
                prop::sample::select(vec!["t", "n", "when", "other"]),
                arb_value(),
                0..4,
            )
        ) {
            let config = config();
            let mut record = EntityRecord::new();
            for (field, value) in fields {
                record.insert("e", field, value);
            }
            let once = normalize(&record, &config);
            let twice = normalize(&once, &config);
            prop_assert_eq!(once, twice);
        }
    }
}
