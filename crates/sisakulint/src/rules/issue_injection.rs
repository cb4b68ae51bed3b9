//! Issue-injection rule (spec §4.9 scenario 2): flags direct `${{...}}`
//! interpolation inside `run:` scripts. Any value reachable through a
//! workflow trigger (issue titles, PR branch names, commit messages, ...)
//! that gets substituted directly into a shell script before execution is a
//! command-injection vector, independent of whether the expression rule's
//! taint tracker happens to recognize the specific path as untrusted.

use crate::position::Diagnostic;
use crate::tree::{Exec, Job, Step};
use crate::walker::{Rule, RuleCtx};

use super::{advance_position, expr_fragments};

pub struct IssueInjectionRule {
    diagnostics: Vec<Diagnostic>,
}

impl IssueInjectionRule {
    pub fn new() -> Self {
        Self { diagnostics: Vec::new() }
    }
}

impl Rule for IssueInjectionRule {
    fn name(&self) -> &'static str {
        "issue-injection"
    }

    fn visit_step(&mut self, ctx: &RuleCtx, _job: &Job, step: &Step) -> anyhow::Result<()> {
        let Exec::Run(run) = &step.exec else {
            return Ok(());
        };
        for (offset, _) in expr_fragments(&run.run) {
            let pos = advance_position(run.run_pos, &run.run, offset);
            self.diagnostics.push(Diagnostic::new(
                ctx.filepath,
                pos,
                "issue-injection",
                "template expression interpolated directly into a shell script; pass it through an `env:` variable instead to avoid script injection",
            ));
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
        let mut rule: Box<dyn Rule> = Box::new(IssueInjectionRule::new());
        walk(&ctx, &wf, std::slice::from_mut(&mut rule)).unwrap()
    }

    #[test]
    fn test_direct_interpolation_flagged() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo ${{ github.event.issue.title }}\n";
        let diags = run_rule(yaml);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("env:"));
    }

    #[test]
    fn test_plain_run_clean() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo hi\n";
        let diags = run_rule(yaml);
        assert!(diags.is_empty());
    }
}
