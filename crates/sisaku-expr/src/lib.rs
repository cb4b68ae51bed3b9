//! Tokenizer, parser, gradual type lattice, and semantic checker for
//! GitHub-Actions-style `${{ ... }}` expressions.

pub mod ast;
pub mod checker;
pub mod functions;
pub mod position;
pub mod token;
pub mod types;
pub mod untrusted;

pub use ast::{parse, CompareKind, Expr, LogicalKind, ParseError, SpannedExpr};
pub use checker::{Diagnostic, Env};
pub use position::Position;
pub use types::{ObjectType, Type};
pub use untrusted::UntrustedFinding;
