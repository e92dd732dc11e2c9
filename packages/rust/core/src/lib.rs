//! Core pipeline and domain logic for collection-index.
//!
//! This crate turns collection bundles into an index: input normalization,
//! bundle filtering, collection extraction, index assembly, and the
//! end-to-end `generate_index` workflow.

pub mod assembler;
pub mod extract;
pub mod filter;
pub mod input;
pub mod pipeline;
pub mod validate;

pub use collection_index_shared::Diagnostic;
pub use input::InputSelection;
pub use pipeline::{
    GenerateConfig, IndexOutcome, ProgressReporter, SilentProgress, build_index, generate_index,
};
