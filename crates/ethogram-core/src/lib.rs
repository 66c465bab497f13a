//! Core types, configuration compilation, and the constraint grammar for
//! turning spoken animal observations into structured records.

pub mod annotation;
pub mod config;
pub mod constraint;
mod error;
pub mod record;
pub mod registry;
pub mod value;

pub use annotation::{AnnotationProvider, AnnotationSpan};
pub use config::{CompiledConfig, ConfigSource, EntityTypeDefinition, FieldDef};
pub use constraint::Constraint;
pub use error::{AnnotationError, ConfigError, RuleExecutionError};
pub use record::{AlertRecord, EntityRecord, ExtractionCandidate, Severity, SourceKind};
pub use registry::ConfigRegistry;
pub use value::{FieldKind, FieldValue};
