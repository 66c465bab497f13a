use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Invalid configuration. Raised only while compiling; the previously
/// published configuration stays active.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("entity type '{0}' is declared more than once")]
    DuplicateEntity(String),

    #[error("entity type name '{0}' is reserved")]
    ReservedEntity(String),

    #[error("entity '{entity}' declares field '{field}' more than once")]
    DuplicateField { entity: String, field: String },

    #[error("entity '{entity}' references unknown field '{field}' in {context}")]
    UnknownField {
        entity: String,
        field: String,
        context: &'static str,
    },

    #[error("field '{entity}.{field}' references unknown rule '{rule}'")]
    UnknownRule {
        entity: String,
        field: String,
        rule: String,
    },

    #[error("rule '{rule}' does not compile: {message}")]
    InvalidRule { rule: String, message: String },

    #[error("rule '{rule}' has no capture group '{group}' (needed by '{entity}.{field}')")]
    MissingGroup {
        rule: String,
        group: String,
        entity: String,
        field: String,
    },

    #[error("field '{entity}.{field}' references unknown dictionary '{dictionary}'")]
    UnknownDictionary {
        entity: String,
        field: String,
        dictionary: String,
    },

    #[error("dictionary '{dictionary}' has conflicting entries for '{key}'")]
    DuplicateDictionaryKey { dictionary: String, key: String },

    #[error("dictionary '{dictionary}' is not idempotent: canonical '{canonical}' maps to '{other}'")]
    NonIdempotentDictionary {
        dictionary: String,
        canonical: String,
        other: String,
    },

    #[error("constraint on '{entity}.{field}' does not parse: {message}")]
    InvalidConstraint {
        entity: String,
        field: String,
        message: String,
    },

    #[error("constraint on '{entity}.{field}' needs a number field, found {kind}")]
    ConstraintOnNonNumeric {
        entity: String,
        field: String,
        kind: &'static str,
    },

    #[error("span type '{span_type}' is mapped to both '{first}' and '{second}'")]
    DuplicateSpanMapping {
        span_type: String,
        first: String,
        second: String,
    },

    #[error("message template for '{entity}.{field}' uses unknown placeholder '{{{placeholder}}}'")]
    InvalidTemplate {
        entity: String,
        field: String,
        placeholder: String,
    },
}

/// A rule that could not run within its execution budget. The rule
/// contributes no candidates and the observation is reported as degraded.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleExecutionError {
    #[error("rule '{rule}' skipped: input of {len} bytes exceeds its {limit}-byte budget")]
    BudgetExceeded {
        rule: String,
        limit: usize,
        len: usize,
    },
}

/// Failure reported by an external Annotation Provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotationError {
    #[error("annotator '{annotator}' failed: {message}")]
    Failed { annotator: String, message: String },
}
