//! Source positions and diagnostic records (spec §4.1).

use std::cmp::Ordering;

/// A position within a YAML source document.
///
/// `line` and `col` are 1-based; `offset` is the 0-based byte offset from
/// the start of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub col: usize,
    pub offset: usize,
}

impl Position {
    pub const fn start() -> Self {
        Self { line: 1, col: 1, offset: 0 }
    }
}

impl From<sisaku_expr::Position> for Position {
    fn from(p: sisaku_expr::Position) -> Self {
        Self { line: p.line, col: p.col, offset: p.offset }
    }
}

/// A single finding, independent of any particular output format.
///
/// Ordered by `(filepath, line, col)`, matching the orchestrator's
/// aggregation order (spec §4.12).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub filepath: String,
    pub line: usize,
    pub col: usize,
    pub rule_kind: String,
}

impl Diagnostic {
    pub fn new(filepath: impl Into<String>, pos: Position, rule_kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            filepath: filepath.into(),
            line: pos.line,
            col: pos.col,
            rule_kind: rule_kind.into(),
        }
    }

    /// A diagnostic with no useful position (e.g. a whole-document error);
    /// pins to the start of the file so sort order stays deterministic.
    pub fn at_start(filepath: impl Into<String>, rule_kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(filepath, Position::start(), rule_kind, message)
    }
}

impl Eq for Diagnostic {}

impl PartialOrd for Diagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Diagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.filepath, self.line, self.col).cmp(&(&other.filepath, other.line, other.col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_file_then_line_then_col() {
        let mut diags = vec![
            Diagnostic::new("b.yml", Position { line: 1, col: 1, offset: 0 }, "syntax", "x"),
            Diagnostic::new("a.yml", Position { line: 5, col: 1, offset: 0 }, "syntax", "x"),
            Diagnostic::new("a.yml", Position { line: 2, col: 9, offset: 0 }, "syntax", "x"),
            Diagnostic::new("a.yml", Position { line: 2, col: 3, offset: 0 }, "syntax", "x"),
        ];
        diags.sort();
        let order: Vec<_> = diags.iter().map(|d| (d.filepath.as_str(), d.line, d.col)).collect();
        assert_eq!(
            order,
            vec![("a.yml", 2, 3), ("a.yml", 2, 9), ("a.yml", 5, 1), ("b.yml", 1, 1)]
        );
    }
}
