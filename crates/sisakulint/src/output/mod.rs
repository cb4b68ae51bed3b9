//! Diagnostic rendering (spec §6, peripheral/contract-only): two renderers,
//! selected by the CLI's `--format` flag.

pub mod plain;
pub mod sarif;
