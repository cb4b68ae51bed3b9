//! SARIF v2.1.0 output (spec §6): one `result` per diagnostic, `ruleId` the
//! rule kind, level `warning`, physical location with line/column and
//! snippet text.
//!
//! Grounded on the teacher's `output/sarif.rs`: the same `serde-sarif`
//! builder API, the same rule-deduplication-by-id pass before emitting
//! `rules`.

use std::collections::HashSet;

use serde_sarif::sarif::{
    ArtifactLocation, Location as SarifLocation, Message, MultiformatMessageString,
    PhysicalLocation, Region, ReportingDescriptor, Result as SarifResult, ResultLevel, Run, Sarif,
    Tool, ToolComponent,
};

use crate::position::Diagnostic;

/// Builds a complete SARIF document for `diagnostics`.
pub fn build(diagnostics: &[Diagnostic]) -> Sarif {
    Sarif::builder()
        .version("2.1.0")
        .schema("https://docs.oasis-open.org/sarif/sarif/v2.1.0/os/schemas/sarif-schema-2.1.0.json")
        .runs([build_run(diagnostics)])
        .build()
}

fn build_run(diagnostics: &[Diagnostic]) -> Run {
    Run::builder()
        .tool(
            Tool::builder()
                .driver(
                    ToolComponent::builder()
                        .name(env!("CARGO_PKG_NAME"))
                        .version(env!("CARGO_PKG_VERSION"))
                        .information_uri(env!("CARGO_PKG_REPOSITORY"))
                        .rules(build_rules(diagnostics))
                        .build(),
                )
                .build(),
        )
        .results(build_results(diagnostics))
        .build()
}

fn build_rules(diagnostics: &[Diagnostic]) -> Vec<ReportingDescriptor> {
    let mut seen = HashSet::new();
    diagnostics
        .iter()
        .filter(|d| seen.insert(d.rule_kind.as_str()))
        .map(|d| {
            ReportingDescriptor::builder()
                .id(d.rule_kind.clone())
                .name(d.rule_kind.clone())
                .short_description(MultiformatMessageString::builder().text(d.rule_kind.clone()).build())
                .build()
        })
        .collect()
}

fn build_results(diagnostics: &[Diagnostic]) -> Vec<SarifResult> {
    diagnostics.iter().map(build_result).collect()
}

fn build_result(diagnostic: &Diagnostic) -> SarifResult {
    SarifResult::builder()
        .rule_id(diagnostic.rule_kind.clone())
        .message(Message::builder().text(diagnostic.message.clone()).build())
        .level(ResultLevel::Warning)
        .locations([SarifLocation::builder()
            .physical_location(
                PhysicalLocation::builder()
                    .artifact_location(ArtifactLocation::builder().uri(diagnostic.filepath.clone()).build())
                    .region(
                        Region::builder()
                            .start_line(diagnostic.line as i64)
                            .start_column(diagnostic.col as i64)
                            .build(),
                    )
                    .build(),
            )
            .build()])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    #[test]
    fn test_build_emits_one_result_per_diagnostic() {
        let diagnostics = vec![
            Diagnostic::new("w.yml", Position { line: 1, col: 1, offset: 0 }, "permissions", "too broad"),
            Diagnostic::new("w.yml", Position { line: 2, col: 3, offset: 10 }, "id", "bad id"),
        ];
        let sarif = build(&diagnostics);
        assert_eq!(sarif.runs[0].results.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_build_deduplicates_rule_descriptors() {
        let diagnostics = vec![
            Diagnostic::new("w.yml", Position { line: 1, col: 1, offset: 0 }, "id", "first"),
            Diagnostic::new("w.yml", Position { line: 2, col: 1, offset: 5 }, "id", "second"),
        ];
        let sarif = build(&diagnostics);
        let rules = sarif.runs[0].tool.driver.rules.as_ref().unwrap();
        assert_eq!(rules.len(), 1);
    }
}
