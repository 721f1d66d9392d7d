//! Pipeline orchestration for apietl.
//!
//! This crate ties together extraction, transformation, CSV output and the
//! analytics database into one end-to-end run (`run_pipeline`), plus the
//! standalone analytics step that only needs an existing database.

pub mod analytics;
pub mod pipeline;
