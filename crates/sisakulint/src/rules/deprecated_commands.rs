//! Deprecated commands rule (spec §4.9 scenario 4): flags the legacy
//! `::workflow-command::` syntax for commands GitHub Actions has removed in
//! favor of environment-file-based replacements.

use std::sync::OnceLock;

use regex::Regex;

use crate::position::Diagnostic;
use crate::tree::{Exec, Job, Step};
use crate::walker::{Rule, RuleCtx};

use super::advance_position;

struct Deprecated {
    pattern: &'static str,
    replacement: &'static str,
}

const DEPRECATED: &[Deprecated] = &[
    Deprecated { pattern: r"::set-output\s+name=", replacement: "echo \"{name}={value}\" >> $GITHUB_OUTPUT" },
    Deprecated { pattern: r"::save-state\s+name=", replacement: "echo \"{name}={value}\" >> $GITHUB_STATE" },
    Deprecated { pattern: r"::set-env\s+name=", replacement: "echo \"{name}={value}\" >> $GITHUB_ENV" },
    Deprecated { pattern: r"::add-path::", replacement: "echo \"{path}\" >> $GITHUB_PATH" },
];

fn regexes() -> &'static Vec<Regex> {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| DEPRECATED.iter().map(|d| Regex::new(d.pattern).unwrap()).collect())
}

pub struct DeprecatedCommandsRule {
    diagnostics: Vec<Diagnostic>,
}

impl DeprecatedCommandsRule {
    pub fn new() -> Self {
        Self { diagnostics: Vec::new() }
    }
}

impl Rule for DeprecatedCommandsRule {
    fn name(&self) -> &'static str {
        "deprecated-commands"
    }

    fn visit_step(&mut self, ctx: &RuleCtx, _job: &Job, step: &Step) -> anyhow::Result<()> {
        let Exec::Run(run) = &step.exec else {
            return Ok(());
        };
        for (re, deprecated) in regexes().iter().zip(DEPRECATED) {
            for m in re.find_iter(&run.run) {
                let pos = advance_position(run.run_pos, &run.run, m.start());
                self.diagnostics.push(Diagnostic::new(
                    ctx.filepath,
                    pos,
                    "deprecated-commands",
                    format!(
                        "this workflow command has been deprecated and disabled by GitHub; use `{}` instead",
                        deprecated.replacement
                    ),
                ));
            }
        }
        Ok(())
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Caches;
    use crate::config::Config;
    use crate::decode::decode;
    use crate::walker::walk;

    fn run_rule(yaml: &str) -> Vec<Diagnostic> {
        let (wf, _) = decode("w.yml", yaml);
        let config = Config::default();
        let caches = Caches::new();
        let ctx = RuleCtx { filepath: "w.yml", project: None, config: &config, caches: &caches };
        let mut rule: Box<dyn Rule> = Box::new(DeprecatedCommandsRule::new());
        walk(&ctx, &wf, std::slice::from_mut(&mut rule)).unwrap()
    }

    #[test]
    fn test_set_output_flagged() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo \"::set-output name=foo::bar\"\n";
        let diags = run_rule(yaml);
        assert!(diags.iter().any(|d| d.message.contains("GITHUB_OUTPUT")));
    }

    #[test]
    fn test_clean_run_no_diagnostics() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo \"foo=bar\" >> \"$GITHUB_OUTPUT\"\n";
        let diags = run_rule(yaml);
        assert!(diags.is_empty());
    }
}
