//! Shared types, error model, and configuration for apietl.
//!
//! This crate is the foundation depended on by all other apietl crates.
//! It provides:
//! - [`EtlError`]: the unified error type
//! - Record types ([`RawUser`], [`RawPost`], [`CleanedUser`], [`EnrichedPost`], [`UserPostSummary`])
//! - Run history types ([`RunId`], [`PipelineRun`], [`RunStats`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, OutputConfig, OutputPaths, PipelineConfig, SourceConfig, SourceOptions, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{EtlError, Result};
pub use types::{
    Address, CleanedUser, Company, EnrichedPost, PipelineRun, RawPost, RawUser, RunId, RunStats,
    RunStatus, UserPostSummary,
};
