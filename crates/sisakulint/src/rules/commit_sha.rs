//! Commit-SHA pinning rule (spec §4.9): warns when a step's `uses:` names a
//! third-party action by a mutable ref (branch or tag) instead of a pinned
//! 40-hex commit SHA. First-party `actions/*` actions are exempted: they're
//! maintained by the same organization that runs the platform, which
//! narrows (without eliminating) the supply-chain risk a tag-pin carries.

use sisaku_models::Uses;

use crate::position::Diagnostic;
use crate::tree::{Exec, Job, Step};
use crate::walker::{Rule, RuleCtx};

pub struct CommitShaRule {
    diagnostics: Vec<Diagnostic>,
}

impl CommitShaRule {
    pub fn new() -> Self {
        Self { diagnostics: Vec::new() }
    }
}

impl Rule for CommitShaRule {
    fn name(&self) -> &'static str {
        "commit-sha"
    }

    fn visit_step(&mut self, ctx: &RuleCtx, _job: &Job, step: &Step) -> anyhow::Result<()> {
        let Exec::Action(action) = &step.exec else {
            return Ok(());
        };
        let Ok(Uses::Repository(repo)) = Uses::parse(action.uses.clone()) else {
            return Ok(());
        };
        if !repo.is_first_party() && !repo.is_sha_pinned() {
            self.diagnostics.push(Diagnostic::new(
                ctx.filepath,
                action.uses_pos,
                "commit-sha",
                format!(
                    "'{}' is pinned to a mutable ref ('{}'); pin to a full-length commit SHA instead",
                    repo.slug(),
                    repo.git_ref()
                ),
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
        let mut rule: Box<dyn Rule> = Box::new(CommitShaRule::new());
        walk(&ctx, &wf, std::slice::from_mut(&mut rule)).unwrap()
    }

    #[test]
    fn test_third_party_tag_flagged() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - uses: someorg/someaction@v1\n";
        let diags = run_rule(yaml);
        assert!(diags.iter().any(|d| d.message.contains("mutable ref")));
    }

    #[test]
    fn test_first_party_tag_exempt() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - uses: actions/checkout@v4\n";
        let diags = run_rule(yaml);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_sha_pinned_clean() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - uses: someorg/someaction@8f4b7f84864484a7bf31766abe9204da3cbe65b3\n";
        let diags = run_rule(yaml);
        assert!(diags.is_empty());
    }
}
