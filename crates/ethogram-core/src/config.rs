//! Entity-extraction configuration: the declarative source document and its
//! compiled, immutable form.
//!
//! Compilation is all-or-nothing. Every reference (fields named by
//! `required` and `validators`, rules and capture groups named by
//! extractors, dictionaries named by fields) is resolved up front, so a
//! [`CompiledConfig`] never fails at use time.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constraint::Constraint;
use crate::error::ConfigError;
use crate::record::{ALERT_ENTITY, Severity};
use crate::value::FieldKind;

/// Default per-rule execution budget, in bytes of input scanned.
pub const DEFAULT_MAX_SCAN_BYTES: usize = 64 * 1024;
/// Default compiled-size ceiling for a single rule's regex.
pub const DEFAULT_MAX_COMPILED_SIZE: usize = 1 << 20;
/// Alert message used when a field does not configure its own.
pub const DEFAULT_MESSAGE: &str = "Abnormal {field}: {value}";

const BUILTIN_CONFIG: &str = include_str!("../config/default.json");
const TEMPLATE_PLACEHOLDERS: &[&str] = &["entity", "field", "value"];

// ── Source document ──

/// The declarative configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSource {
    pub entities: Vec<EntitySource>,
    #[serde(default)]
    pub rules: BTreeMap<String, RuleSource>,
    #[serde(default)]
    pub dictionaries: BTreeMap<String, BTreeMap<String, String>>,
    /// Annotator priority, highest first.
    #[serde(default)]
    pub annotators: Vec<String>,
    #[serde(default)]
    pub limits: Limits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySource {
    pub name: String,
    pub fields: Vec<FieldSource>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub validators: BTreeMap<String, String>,
}

/// A field is either a bare name or a full definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSource {
    Name(String),
    Spec(FieldSpec),
}

impl FieldSource {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Spec(spec) => &spec.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    /// Inferred when absent: `number` if the field has a validator,
    /// otherwise `text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FieldKind>,
    #[serde(default)]
    pub extractors: Vec<ExtractorSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractorSource {
    /// Named capture `group` (default: the field name) of regex rule `rule`.
    Rule {
        rule: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
    },
    /// Annotation spans of the given type.
    Span { span: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSource {
    Pattern(String),
    Spec {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_scan_bytes: Option<usize>,
    },
}

impl RuleSource {
    pub fn pattern(&self) -> &str {
        match self {
            Self::Pattern(p) => p,
            Self::Spec { pattern, .. } => pattern,
        }
    }

    fn max_scan_bytes(&self) -> Option<usize> {
        match self {
            Self::Pattern(_) => None,
            Self::Spec { max_scan_bytes, .. } => *max_scan_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default = "default_max_scan_bytes")]
    pub max_scan_bytes: usize,
    #[serde(default = "default_max_compiled_size")]
    pub max_compiled_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_scan_bytes: DEFAULT_MAX_SCAN_BYTES,
            max_compiled_size: DEFAULT_MAX_COMPILED_SIZE,
        }
    }
}

fn default_max_scan_bytes() -> usize {
    DEFAULT_MAX_SCAN_BYTES
}

fn default_max_compiled_size() -> usize {
    DEFAULT_MAX_COMPILED_SIZE
}

impl ConfigSource {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The configuration shipped with the crate.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(BUILTIN_CONFIG)
    }

    /// The shipped configuration as raw JSON text.
    pub fn builtin_json() -> &'static str {
        BUILTIN_CONFIG
    }
}

// ── Compiled form ──

/// One source a field draws candidates from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extractor {
    Pattern { rule: String, group: String },
    Span { span_type: String },
}

/// Alert message with `{entity}`, `{field}` and `{value}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate(String);

impl MessageTemplate {
    fn compile(raw: &str, entity: &str, field: &str) -> Result<Self, ConfigError> {
        let mut rest = raw;
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else { break };
            let placeholder = &after[..close];
            if !TEMPLATE_PLACEHOLDERS.contains(&placeholder) {
                return Err(ConfigError::InvalidTemplate {
                    entity: entity.to_string(),
                    field: field.to_string(),
                    placeholder: placeholder.to_string(),
                });
            }
            rest = &after[close + 1..];
        }
        Ok(Self(raw.to_string()))
    }

    /// Substitute placeholders in one pass; substituted text is never
    /// re-scanned.
    pub fn render(&self, entity: &str, field: &str, value: &str) -> String {
        let mut out = String::with_capacity(self.0.len() + value.len());
        let mut rest = self.0.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let substitution = after.find('}').and_then(|close| {
                let text = match &after[..close] {
                    "entity" => entity,
                    "field" => field,
                    "value" => value,
                    _ => return None,
                };
                Some((text, close))
            });
            match substitution {
                Some((text, close)) => {
                    out.push_str(text);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A compiled field definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    /// Ordered by priority; index 0 is the highest.
    pub extractors: Vec<Extractor>,
    pub dictionary: Option<String>,
    pub constraint: Option<Constraint>,
    pub severity: Severity,
    pub message: MessageTemplate,
}

/// A compiled entity type.
#[derive(Debug, Clone)]
pub struct EntityTypeDefinition {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub required: BTreeSet<String>,
}

impl EntityTypeDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Where a rule's capture lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternTarget {
    pub entity: String,
    pub field: String,
    pub group: String,
    pub kind: FieldKind,
    pub priority: usize,
}

/// A compiled regex rule plus the fields it feeds.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub regex: Regex,
    pub max_scan_bytes: usize,
    pub targets: Vec<PatternTarget>,
}

/// Where spans of one annotation type land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanTarget {
    pub entity: String,
    pub field: String,
    pub priority: usize,
}

/// Case-insensitive canonical-form lookup table.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: HashMap<String, String>,
}

impl Dictionary {
    fn compile(name: &str, raw: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut entries: HashMap<String, String> = HashMap::with_capacity(raw.len());
        for (key, canonical) in raw {
            let key = key.trim().to_lowercase();
            if let Some(existing) = entries.get(&key)
                && existing != canonical
            {
                return Err(ConfigError::DuplicateDictionaryKey {
                    dictionary: name.to_string(),
                    key,
                });
            }
            entries.insert(key, canonical.clone());
        }

        // A canonical value that is itself a key must map to itself,
        // otherwise re-normalising would change it again.
        for canonical in entries.values() {
            if let Some(other) = entries.get(&canonical.trim().to_lowercase())
                && other != canonical
            {
                return Err(ConfigError::NonIdempotentDictionary {
                    dictionary: name.to_string(),
                    canonical: canonical.clone(),
                    other: other.clone(),
                });
            }
        }

        Ok(Self { entries })
    }

    pub fn lookup(&self, raw: &str) -> Option<&str> {
        self.entries
            .get(&raw.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Immutable, compiled rule set. Safe to share across threads; replaced
/// wholesale on reconfiguration.
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    entities: Vec<EntityTypeDefinition>,
    rules: Vec<CompiledRule>,
    span_targets: BTreeMap<String, SpanTarget>,
    dictionaries: BTreeMap<String, Dictionary>,
    annotators: Vec<String>,
}

impl CompiledConfig {
    /// Validate and compile a configuration document.
    pub fn compile(source: &ConfigSource) -> Result<Self, ConfigError> {
        let mut dictionaries = BTreeMap::new();
        for (name, raw) in &source.dictionaries {
            dictionaries.insert(name.clone(), Dictionary::compile(name, raw)?);
        }

        let mut entities = Vec::with_capacity(source.entities.len());
        let mut seen_entities = BTreeSet::new();
        for entity in &source.entities {
            if entity.name == ALERT_ENTITY {
                return Err(ConfigError::ReservedEntity(entity.name.clone()));
            }
            if !seen_entities.insert(entity.name.as_str()) {
                return Err(ConfigError::DuplicateEntity(entity.name.clone()));
            }
            entities.push(compile_entity(entity, source, &dictionaries)?);
        }

        let rules = compile_rules(source, &entities)?;
        let span_targets = compile_span_targets(&entities)?;

        info!(
            entities = entities.len(),
            rules = rules.len(),
            span_types = span_targets.len(),
            dictionaries = dictionaries.len(),
            "compiled entity configuration"
        );

        Ok(Self {
            entities,
            rules,
            span_targets,
            dictionaries,
            annotators: source.annotators.clone(),
        })
    }

    /// Compile the configuration shipped with the crate.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::compile(&ConfigSource::builtin()?)
    }

    /// Entity types in declaration order.
    pub fn entities(&self) -> &[EntityTypeDefinition] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&EntityTypeDefinition> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn field(&self, entity: &str, field: &str) -> Option<&FieldDef> {
        self.entity(entity).and_then(|e| e.field(field))
    }

    /// Rules in name order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn span_target(&self, span_type: &str) -> Option<&SpanTarget> {
        self.span_targets.get(span_type)
    }

    pub fn dictionary(&self, name: &str) -> Option<&Dictionary> {
        self.dictionaries.get(name)
    }

    pub fn annotators(&self) -> &[String] {
        &self.annotators
    }

    /// Rank of an annotator; undeclared or anonymous annotators rank last.
    pub fn annotator_rank(&self, annotator: Option<&str>) -> usize {
        annotator
            .and_then(|name| self.annotators.iter().position(|a| a == name))
            .unwrap_or(self.annotators.len())
    }
}

// ── Compilation helpers ──

fn compile_entity(
    entity: &EntitySource,
    source: &ConfigSource,
    dictionaries: &BTreeMap<String, Dictionary>,
) -> Result<EntityTypeDefinition, ConfigError> {
    let mut names = BTreeSet::new();
    for field in &entity.fields {
        if !names.insert(field.name()) {
            return Err(ConfigError::DuplicateField {
                entity: entity.name.clone(),
                field: field.name().to_string(),
            });
        }
    }

    for field in entity.validators.keys() {
        if !names.contains(field.as_str()) {
            return Err(unknown_field(&entity.name, field, "validators"));
        }
    }
    let mut required = BTreeSet::new();
    for field in &entity.required {
        if !names.contains(field.as_str()) {
            return Err(unknown_field(&entity.name, field, "required"));
        }
        required.insert(field.clone());
    }

    let fields = entity
        .fields
        .iter()
        .map(|field| compile_field(&entity.name, field, entity, source, dictionaries))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EntityTypeDefinition {
        name: entity.name.clone(),
        fields,
        required,
    })
}

fn compile_field(
    entity_name: &str,
    field: &FieldSource,
    entity: &EntitySource,
    source: &ConfigSource,
    dictionaries: &BTreeMap<String, Dictionary>,
) -> Result<FieldDef, ConfigError> {
    let name = field.name();
    let validator = entity.validators.get(name);
    let spec = match field {
        FieldSource::Name(_) => None,
        FieldSource::Spec(spec) => Some(spec),
    };

    let kind = spec.and_then(|s| s.kind).unwrap_or(if validator.is_some() {
        FieldKind::Number
    } else {
        FieldKind::Text
    });

    let constraint = match validator {
        None => None,
        Some(_) if kind != FieldKind::Number => {
            return Err(ConfigError::ConstraintOnNonNumeric {
                entity: entity_name.to_string(),
                field: name.to_string(),
                kind: kind.as_str(),
            });
        }
        Some(expr) => Some(Constraint::parse(expr).map_err(|message| {
            ConfigError::InvalidConstraint {
                entity: entity_name.to_string(),
                field: name.to_string(),
                message,
            }
        })?),
    };

    let mut extractors = Vec::new();
    for extractor in spec.map(|s| s.extractors.as_slice()).unwrap_or_default() {
        extractors.push(match extractor {
            ExtractorSource::Rule { rule, group } => {
                if !source.rules.contains_key(rule) {
                    return Err(ConfigError::UnknownRule {
                        entity: entity_name.to_string(),
                        field: name.to_string(),
                        rule: rule.clone(),
                    });
                }
                Extractor::Pattern {
                    rule: rule.clone(),
                    group: group.clone().unwrap_or_else(|| name.to_string()),
                }
            }
            ExtractorSource::Span { span } => Extractor::Span {
                span_type: span.clone(),
            },
        });
    }

    let dictionary = spec.and_then(|s| s.dictionary.clone());
    if let Some(dict) = &dictionary
        && !dictionaries.contains_key(dict)
    {
        return Err(ConfigError::UnknownDictionary {
            entity: entity_name.to_string(),
            field: name.to_string(),
            dictionary: dict.clone(),
        });
    }

    let message = spec
        .and_then(|s| s.message.as_deref())
        .unwrap_or(DEFAULT_MESSAGE);

    Ok(FieldDef {
        name: name.to_string(),
        kind,
        extractors,
        dictionary,
        constraint,
        severity: spec.map(|s| s.severity).unwrap_or_default(),
        message: MessageTemplate::compile(message, entity_name, name)?,
    })
}

fn compile_rules(
    source: &ConfigSource,
    entities: &[EntityTypeDefinition],
) -> Result<Vec<CompiledRule>, ConfigError> {
    let mut rules = Vec::with_capacity(source.rules.len());

    for (name, rule) in &source.rules {
        let regex = RegexBuilder::new(rule.pattern())
            .size_limit(source.limits.max_compiled_size)
            .build()
            .map_err(|e| ConfigError::InvalidRule {
                rule: name.clone(),
                message: e.to_string(),
            })?;

        let mut targets = Vec::new();
        for entity in entities {
            for field in &entity.fields {
                for (priority, extractor) in field.extractors.iter().enumerate() {
                    let Extractor::Pattern { rule, group } = extractor else {
                        continue;
                    };
                    if rule != name {
                        continue;
                    }
                    if !regex.capture_names().flatten().any(|n| n == group) {
                        return Err(ConfigError::MissingGroup {
                            rule: name.clone(),
                            group: group.clone(),
                            entity: entity.name.clone(),
                            field: field.name.clone(),
                        });
                    }
                    targets.push(PatternTarget {
                        entity: entity.name.clone(),
                        field: field.name.clone(),
                        group: group.clone(),
                        kind: field.kind,
                        priority,
                    });
                }
            }
        }

        if targets.is_empty() {
            debug!(rule = %name, "rule is not referenced by any field");
        }

        rules.push(CompiledRule {
            name: name.clone(),
            regex,
            max_scan_bytes: rule.max_scan_bytes().unwrap_or(source.limits.max_scan_bytes),
            targets,
        });
    }

    Ok(rules)
}

fn compile_span_targets(
    entities: &[EntityTypeDefinition],
) -> Result<BTreeMap<String, SpanTarget>, ConfigError> {
    let mut targets: BTreeMap<String, SpanTarget> = BTreeMap::new();

    for entity in entities {
        for field in &entity.fields {
            for (priority, extractor) in field.extractors.iter().enumerate() {
                let Extractor::Span { span_type } = extractor else {
                    continue;
                };
                if let Some(existing) = targets.get(span_type) {
                    return Err(ConfigError::DuplicateSpanMapping {
                        span_type: span_type.clone(),
                        first: format!("{}.{}", existing.entity, existing.field),
                        second: format!("{}.{}", entity.name, field.name),
                    });
                }
                targets.insert(
                    span_type.clone(),
                    SpanTarget {
                        entity: entity.name.clone(),
                        field: field.name.clone(),
                        priority,
                    },
                );
            }
        }
    }

    Ok(targets)
}

fn unknown_field(entity: &str, field: &str, context: &'static str) -> ConfigError {
    ConfigError::UnknownField {
        entity: entity.to_string(),
        field: field.to_string(),
        context,
    }
}
