//! Static analysis for GitHub-Actions-style workflow YAML.
//!
//! The pipeline: [`decode`] turns a YAML document into the enriched
//! [`tree::Workflow`]; [`walker`] drives a fixed traversal order over that
//! tree, dispatching to every registered [`rules::Rule`]; [`orchestrator`]
//! schedules this per file across a worker pool and aggregates the result.

pub mod cache;
pub mod config;
pub mod decode;
pub mod orchestrator;
pub mod output;
pub mod position;
pub mod project;
pub mod rules;
pub mod tree;
pub mod walker;

pub use position::{Diagnostic, Position};
