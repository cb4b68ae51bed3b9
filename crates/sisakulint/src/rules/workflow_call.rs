//! Workflow-call wiring rule (spec §4.9 scenario 6): for a job invoking a
//! local reusable workflow (`uses: ./...yml`), verifies the declared inputs
//! line up with what the target workflow's `on.workflow_call` requires.

use sisaku_models::Uses;

use crate::position::Diagnostic;
use crate::tree::{Job, SecretsArg};
use crate::walker::{Rule, RuleCtx};

pub struct WorkflowCallRule {
    diagnostics: Vec<Diagnostic>,
}

impl WorkflowCallRule {
    pub fn new() -> Self {
        Self { diagnostics: Vec::new() }
    }
}

impl Rule for WorkflowCallRule {
    fn name(&self) -> &'static str {
        "workflow-call"
    }

    fn visit_job_pre(&mut self, ctx: &RuleCtx, job: &Job) -> anyhow::Result<()> {
        let Some(call) = &job.workflow_call else {
            return Ok(());
        };
        let Ok(Uses::Local(local)) = Uses::parse(call.uses.clone()) else {
            return Ok(());
        };
        let Some(project) = ctx.project else {
            return Ok(());
        };
        let Some(target) = ctx.caches.workflows.resolve(project, &local.path) else {
            return Ok(());
        };

        for (name, input) in &target.inputs {
            let required = input.required.unwrap_or(false) && input.default.is_none();
            if required && !call.with.contains_key(name) {
                self.diagnostics.push(Diagnostic::new(
                    ctx.filepath,
                    call.pos,
                    "workflow-call",
                    format!("input '{name}' is required by '{}' reusable workflow", local.path),
                ));
            }
        }
        for passed in call.with.keys() {
            if !target.inputs.contains_key(passed) {
                self.diagnostics.push(Diagnostic::new(
                    ctx.filepath,
                    call.pos,
                    "workflow-call",
                    format!("'{passed}' is not an input declared by '{}' reusable workflow", local.path),
                ));
            }
        }

        if let SecretsArg::Map(provided) = &call.secrets {
            for (name, secret) in &target.secrets {
                let required = secret.required.unwrap_or(false);
                if required && !provided.contains_key(name) {
                    self.diagnostics.push(Diagnostic::new(
                        ctx.filepath,
                        call.pos,
                        "workflow-call",
                        format!("secret '{name}' is required by '{}' reusable workflow", local.path),
                    ));
                }
            }
            for passed in provided.keys() {
                if !target.secrets.contains_key(passed) {
                    self.diagnostics.push(Diagnostic::new(
                        ctx.filepath,
                        call.pos,
                        "workflow-call",
                        format!("'{passed}' is not a secret declared by '{}' reusable workflow", local.path),
                    ));
                }
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
    use crate::project::Project;
    use crate::walker::walk;

    fn scratch_repo(name: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let root = std::env::temp_dir().join(format!("sisakulint-workflowcall-test-{name}-{nanos}"));
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join(".github/workflows")).unwrap();
        root
    }

    #[test]
    fn test_missing_required_input_flagged() {
        let root = scratch_repo("missing-input");
        std::fs::write(
            root.join(".github/workflows/reusable.yml"),
            "on:\n  workflow_call:\n    inputs:\n      foo:\n        type: string\n        required: true\njobs: {}\n",
        )
        .unwrap();
        let caller = root.join(".github/workflows/caller.yml");
        std::fs::write(
            &caller,
            "on: push\njobs:\n  call:\n    uses: ./.github/workflows/reusable.yml\n",
        )
        .unwrap();

        let project = Project::discover(&caller).unwrap();
        let yaml = std::fs::read_to_string(&caller).unwrap();
        let (wf, _) = decode("caller.yml", &yaml);
        let config = Config::default();
        let caches = Caches::new();
        let ctx = RuleCtx { filepath: "caller.yml", project: Some(&project), config: &config, caches: &caches };
        let mut rule: Box<dyn Rule> = Box::new(WorkflowCallRule::new());
        let diags = walk(&ctx, &wf, std::slice::from_mut(&mut rule)).unwrap();
        assert!(diags.iter().any(|d| d.message.contains("input 'foo' is required")));

        std::fs::remove_dir_all(&root).ok();
    }
}
