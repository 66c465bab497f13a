//! Extraction pipeline: turns observation text plus annotation spans into a
//! validated [`EntityRecord`](ethogram_core::EntityRecord) and its alerts.

pub mod merge;
pub mod normalize;
pub mod pattern;
pub mod pipeline;
pub mod span;
pub mod validate;

pub use pipeline::{Degradation, Extraction, Pipeline, Stage, extract, extract_annotated};
