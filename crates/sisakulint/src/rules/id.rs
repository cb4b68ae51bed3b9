//! ID rule (spec §4.9 / §3): enforces the job/step id pattern and flags
//! duplicate step ids within a job.

use std::collections::HashMap;

use regex::Regex;
use std::sync::OnceLock;

use crate::position::{Diagnostic, Position};
use crate::tree::{Job, Step};
use crate::walker::{Rule, RuleCtx};

fn id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").unwrap())
}

pub struct IdRule {
    diagnostics: Vec<Diagnostic>,
    seen_step_ids: HashMap<String, Position>,
}

impl IdRule {
    pub fn new() -> Self {
        Self { diagnostics: Vec::new(), seen_step_ids: HashMap::new() }
    }
}

impl Rule for IdRule {
    fn name(&self) -> &'static str {
        "id"
    }

    fn visit_job_pre(&mut self, ctx: &RuleCtx, job: &Job) -> anyhow::Result<()> {
        self.seen_step_ids.clear();
        if !id_pattern().is_match(&job.id) {
            self.diagnostics.push(Diagnostic::new(
                ctx.filepath,
                job.pos,
                "id",
                format!("job id '{}' doesn't match the required pattern ^[A-Za-z_][A-Za-z0-9_-]*$", job.id),
            ));
        }
        for needed in &job.needs {
            if !id_pattern().is_match(needed) {
                self.diagnostics.push(Diagnostic::new(
                    ctx.filepath,
                    job.pos,
                    "id",
                    format!("needs reference '{needed}' doesn't match the required id pattern"),
                ));
            }
        }
        Ok(())
    }

    fn visit_step(&mut self, ctx: &RuleCtx, _job: &Job, step: &Step) -> anyhow::Result<()> {
        let Some(id) = &step.id else {
            return Ok(());
        };
        if !id_pattern().is_match(id) {
            self.diagnostics.push(Diagnostic::new(
                ctx.filepath,
                step.pos,
                "id",
                format!("step id '{id}' doesn't match the required pattern ^[A-Za-z_][A-Za-z0-9_-]*$"),
            ));
        }
        let key = id.to_lowercase();
        if let Some(first_pos) = self.seen_step_ids.get(&key) {
            self.diagnostics.push(Diagnostic::new(
                ctx.filepath,
                step.pos,
                "id",
                format!(
                    "duplicate step id '{id}' (case-insensitive); first used at line {}, col {}",
                    first_pos.line, first_pos.col
                ),
            ));
        } else {
            self.seen_step_ids.insert(key, step.pos);
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
        let mut rule: Box<dyn Rule> = Box::new(IdRule::new());
        walk(&ctx, &wf, std::slice::from_mut(&mut rule)).unwrap()
    }

    #[test]
    fn test_duplicate_step_id_case_insensitive() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - id: Build\n        run: echo 1\n      - id: build\n        run: echo 2\n";
        let diags = run_rule(yaml);
        assert!(diags.iter().any(|d| d.message.contains("duplicate step id")));
    }

    #[test]
    fn test_valid_ids_clean() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - id: setup\n        run: echo 1\n      - id: test\n        run: echo 2\n";
        let diags = run_rule(yaml);
        assert!(diags.is_empty());
    }
}
