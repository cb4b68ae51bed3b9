//! The rule set (spec §4.9): independent analyses dispatched by [`crate::walker`]
//! over the decoded tree. Every rule implements [`crate::walker::Rule`].

mod commit_sha;
mod conditional;
mod credentials;
mod deprecated_commands;
mod expression;
mod id;
mod issue_injection;
mod permissions;
mod self_hosted_runner;
mod workflow_call;

use crate::walker::Rule;

/// Builds one instance of every registered rule, in no particular order
/// (the walker's traversal order is what's fixed, not rule registration
/// order; each rule's diagnostics are independent of the others').
pub fn all_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(expression::ExpressionRule::new()),
        Box::new(permissions::PermissionsRule::new()),
        Box::new(id::IdRule::new()),
        Box::new(conditional::ConditionalRule::new()),
        Box::new(issue_injection::IssueInjectionRule::new()),
        Box::new(deprecated_commands::DeprecatedCommandsRule::new()),
        Box::new(commit_sha::CommitShaRule::new()),
        Box::new(credentials::CredentialsRule::new()),
        Box::new(workflow_call::WorkflowCallRule::new()),
        Box::new(self_hosted_runner::SelfHostedRunnerRule::new()),
    ]
}

/// Finds every `${{ ... }}` fragment in `text`, returning the byte offset of
/// the fragment's inner body (just past `${{`) and the trimmed body itself.
///
/// A workflow string scalar may mix literal text with one or more embedded
/// expressions (e.g. `"pre-${{ github.sha }}-post"`); rules that scan
/// arbitrary carriers need to find each one independently.
pub(crate) fn expr_fragments(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut rest = text;
    let mut base = 0usize;
    while let Some(start) = rest.find("${{") {
        let after_open = start + 3;
        let Some(end) = rest[after_open..].find("}}") else {
            break;
        };
        let body_start = after_open;
        let body_end = after_open + end;
        out.push((base + body_start, rest[body_start..body_end].trim()));
        let consumed = body_end + 2;
        base += consumed;
        rest = &rest[consumed..];
    }
    out
}

/// Advances `base` by `offset` bytes into `text`, tracking line/column.
pub(crate) fn advance_position(
    base: crate::position::Position,
    text: &str,
    offset: usize,
) -> crate::position::Position {
    let prefix = &text[..offset.min(text.len())];
    let newlines = prefix.matches('\n').count();
    if newlines == 0 {
        crate::position::Position {
            line: base.line,
            col: base.col + prefix.chars().count(),
            offset: base.offset + offset,
        }
    } else {
        let after_last_newline = prefix.rsplit('\n').next().unwrap_or("");
        crate::position::Position {
            line: base.line + newlines,
            col: 1 + after_last_newline.chars().count(),
            offset: base.offset + offset,
        }
    }
}

/// Whether `text` contains at least one `${{ ... }}` fragment, and that
/// fragment (trimmed of surrounding whitespace) spans the *entire* string.
pub(crate) fn is_sole_expression(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with("${{") && trimmed.ends_with("}}") && expr_fragments(trimmed).len() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_fragments_finds_multiple() {
        let text = "pre-${{ a.b }}-mid-${{ c }}-post";
        let found = expr_fragments(text);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].1, "a.b");
        assert_eq!(found[1].1, "c");
    }

    #[test]
    fn test_expr_fragments_none() {
        assert!(expr_fragments("plain text").is_empty());
    }

    #[test]
    fn test_advance_position_same_line() {
        let base = crate::position::Position { line: 3, col: 5, offset: 20 };
        let pos = advance_position(base, "echo ${{ x }}", 5);
        assert_eq!(pos.line, 3);
        assert_eq!(pos.col, 10);
    }

    #[test]
    fn test_advance_position_crosses_newline() {
        let base = crate::position::Position { line: 1, col: 1, offset: 0 };
        let pos = advance_position(base, "first\nsecond ${{ x }}", 13);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.col, 7);
    }

    #[test]
    fn test_is_sole_expression() {
        assert!(is_sole_expression("${{ true }}"));
        assert!(!is_sole_expression("${{ false }} || extra"));
        assert!(!is_sole_expression("plain"));
    }
}
