//! Serde-deserializable data model for GitHub-Actions-style workflow YAML
//! sub-schemas: permissions, environment values, `uses:` references, event
//! trigger bodies, matrix row values, and action/reusable-workflow metadata.

pub mod common;
pub mod workflow;

pub use common::{BasePermission, DockerUses, Env, EnvValue, If, LocalUses, Permission, Permissions, RepositoryUses, Uses, UsesError, PERMISSION_SCOPES};
pub use common::expr::LoE;
