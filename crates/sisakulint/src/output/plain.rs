//! "plain" (cargo-style) output (spec §6: `<file>:<line>:<col>: <message>
//! [<ruleKind>]` plus an optional two-line source snippet with an underline).
//!
//! Grounded on the teacher's `output/plain.rs`: same `annotate-snippets`
//! renderer, same `Level`-per-severity styling, folded source snippets. This
//! system has no severity tiers (every diagnostic is just a rule-kind-tagged
//! finding), so every snippet renders at `Level::WARNING`.

use std::collections::HashMap;

use annotate_snippets::{AnnotationKind, Group, Level, Renderer, Snippet};
use anstream::println;
use line_index::{LineCol, LineIndex};
use owo_colors::OwoColorize;

use crate::position::Diagnostic;

/// Renders every diagnostic in `diagnostics` to stdout, one per line, with a
/// folded source snippet when the originating file can still be read from
/// disk (it may have moved or been deleted since analysis).
pub fn render(diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        println!("{}", "No findings to report.".green());
        return;
    }

    let mut sources: HashMap<&str, Option<(String, LineIndex)>> = HashMap::new();

    for diag in diagnostics {
        println!(
            "{file}:{line}:{col}: {message} [{kind}]",
            file = diag.filepath,
            line = diag.line,
            col = diag.col,
            message = diag.message,
            kind = diag.rule_kind.bright_yellow(),
        );

        let entry = sources.entry(diag.filepath.as_str()).or_insert_with(|| {
            std::fs::read_to_string(&diag.filepath).ok().map(|text| {
                let index = LineIndex::new(&text);
                (text, index)
            })
        });

        if let Some((text, index)) = entry {
            if let Some(group) = snippet_group(&diag.filepath, text, index, diag) {
                let renderer = Renderer::styled();
                println!("{}", renderer.render(&[group]));
            }
        }
    }

    println!(
        "{n} finding{s}",
        n = diagnostics.len().green(),
        s = if diagnostics.len() == 1 { "" } else { "s" },
    );
}

fn snippet_group<'a>(
    filepath: &'a str,
    source: &'a str,
    index: &LineIndex,
    diag: &'a Diagnostic,
) -> Option<Group<'a>> {
    let line_col = LineCol { line: (diag.line.checked_sub(1)?) as u32, col: (diag.col.checked_sub(1)?) as u32 };
    let start = index.offset(line_col)?;
    let start = usize::from(start);
    let end = (start + 1).min(source.len());

    let title = Level::WARNING.primary_title(diag.message.as_str()).id(diag.rule_kind.as_str());

    let snippet = Snippet::source(source)
        .fold(true)
        .line_start(1)
        .path(filepath)
        .annotations([AnnotationKind::Primary.span(start..end).label(diag.rule_kind.as_str())]);

    Some(Group::with_title(title).element(snippet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    #[test]
    fn test_snippet_group_locates_offset() {
        let source = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n";
        let index = LineIndex::new(source);
        let diag = Diagnostic::new("w.yml", Position { line: 3, col: 3, offset: 0 }, "id", "bad id");
        let group = snippet_group("w.yml", source, &index, &diag);
        assert!(group.is_some());
    }

    #[test]
    fn test_snippet_group_none_for_out_of_range_position() {
        let source = "on: push\njobs: {}\n";
        let index = LineIndex::new(source);
        let diag = Diagnostic::new("w.yml", Position { line: 99, col: 1, offset: 0 }, "id", "bad id");
        assert!(snippet_group("w.yml", source, &index, &diag).is_none());
    }
}
