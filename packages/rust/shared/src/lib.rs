//! Shared types, error model, and configuration for collection-index.
//!
//! This crate is the foundation depended on by the other workspace crates.
//! It provides:
//! - [`IndexError`]: the unified error type
//! - Domain types ([`Bundle`], [`CollectionIndex`], [`CollectionRecord`], [`Timestamp`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, PolicyConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use diagnostics::Diagnostic;
pub use error::{IndexError, Result};
pub use types::{
    Bundle, COLLECTION_TYPE, CollectionIndex, CollectionObject, CollectionRecord,
    CollectionVersion, IMPORTED_URL, IndexId, LabelSource, MalformedPolicy, ObjectKind, Timestamp,
};
