//! The tree walker (spec §4.8): a fixed, repeatable traversal order over the
//! decoded [`crate::tree::Workflow`], dispatching to every registered rule.
//!
//! Grounded on `zizmor`'s `audit::Audit` trait (`audit_workflow` ->
//! `audit_normal_job` -> `audit_step`), generalized to the explicit
//! Pre/Post hooks spec §4.8 names and re-keyed to this crate's own
//! `Rule` trait rather than `Audit`'s finding-builder API.

use crate::cache::Caches;
use crate::config::Config;
use crate::position::Diagnostic;
use crate::project::Project;
use crate::tree::{Job, Step, Workflow};

/// Context handed to every rule visit: the file under analysis plus the
/// shared, read-mostly collaborators (project, config, metadata caches).
pub struct RuleCtx<'a> {
    pub filepath: &'a str,
    pub project: Option<&'a Project>,
    pub config: &'a Config,
    pub caches: &'a Caches,
}

/// A single independent analysis over the workflow tree.
///
/// Implementors override only the hooks they need; the walker calls every
/// hook on every rule in the fixed order from spec §4.8. A rule accumulates
/// diagnostics internally and yields them via [`Rule::take_diagnostics`]
/// after `visit_workflow_post`.
pub trait Rule {
    fn name(&self) -> &'static str;

    fn visit_workflow_pre(&mut self, _ctx: &RuleCtx, _workflow: &Workflow) -> anyhow::Result<()> {
        Ok(())
    }

    fn visit_job_pre(&mut self, _ctx: &RuleCtx, _job: &Job) -> anyhow::Result<()> {
        Ok(())
    }

    fn visit_step(&mut self, _ctx: &RuleCtx, _job: &Job, _step: &Step) -> anyhow::Result<()> {
        Ok(())
    }

    fn visit_job_post(&mut self, _ctx: &RuleCtx, _job: &Job) -> anyhow::Result<()> {
        Ok(())
    }

    fn visit_workflow_post(&mut self, _ctx: &RuleCtx, _workflow: &Workflow) -> anyhow::Result<()> {
        Ok(())
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic>;
}

/// A rule hook raised a fatal error; the offending rule's name is recorded so
/// the resulting diagnostic can name it.
#[derive(Debug, thiserror::Error)]
#[error("rule '{rule}' failed: {source}")]
pub struct WalkError {
    pub rule: &'static str,
    #[source]
    pub source: anyhow::Error,
}

/// Walks `workflow` in the fixed order of spec §4.8, dispatching to every
/// rule in `rules`, and returns the aggregated (unsorted) diagnostics.
///
/// Any rule hook returning `Err` aborts the *entire* traversal (spec §4.13:
/// "rule-internal errors abort that file's traversal"), surfaced as a
/// [`WalkError`].
pub fn walk(
    ctx: &RuleCtx,
    workflow: &Workflow,
    rules: &mut [Box<dyn Rule>],
) -> Result<Vec<Diagnostic>, WalkError> {
    for rule in rules.iter_mut() {
        rule.visit_workflow_pre(ctx, workflow)
            .map_err(|source| WalkError { rule: rule.name(), source })?;
    }

    // Iteration order is stable over the sorted job-id set (spec §4.8.2).
    let mut job_ids: Vec<&String> = workflow.jobs.keys().collect();
    job_ids.sort();

    for id in job_ids {
        let job = &workflow.jobs[id];

        for rule in rules.iter_mut() {
            rule.visit_job_pre(ctx, job)
                .map_err(|source| WalkError { rule: rule.name(), source })?;
        }

        for step in &job.steps {
            for rule in rules.iter_mut() {
                rule.visit_step(ctx, job, step)
                    .map_err(|source| WalkError { rule: rule.name(), source })?;
            }
        }

        for rule in rules.iter_mut() {
            rule.visit_job_post(ctx, job)
                .map_err(|source| WalkError { rule: rule.name(), source })?;
        }
    }

    for rule in rules.iter_mut() {
        rule.visit_workflow_post(ctx, workflow)
            .map_err(|source| WalkError { rule: rule.name(), source })?;
    }

    let mut diags = Vec::new();
    for rule in rules.iter_mut() {
        diags.extend(rule.take_diagnostics());
    }
    Ok(diags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Caches;
    use crate::config::Config;
    use crate::decode::decode;

    struct RecordingRule {
        order: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
    }

    impl Rule for RecordingRule {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn visit_workflow_pre(&mut self, _ctx: &RuleCtx, _w: &Workflow) -> anyhow::Result<()> {
            self.order.borrow_mut().push("workflow_pre".into());
            Ok(())
        }

        fn visit_job_pre(&mut self, _ctx: &RuleCtx, job: &Job) -> anyhow::Result<()> {
            self.order.borrow_mut().push(format!("job_pre:{}", job.id));
            Ok(())
        }

        fn visit_step(&mut self, _ctx: &RuleCtx, job: &Job, step: &Step) -> anyhow::Result<()> {
            self.order.borrow_mut().push(format!("step:{}:{:?}", job.id, step.id));
            Ok(())
        }

        fn visit_job_post(&mut self, _ctx: &RuleCtx, job: &Job) -> anyhow::Result<()> {
            self.order.borrow_mut().push(format!("job_post:{}", job.id));
            Ok(())
        }

        fn visit_workflow_post(&mut self, _ctx: &RuleCtx, _w: &Workflow) -> anyhow::Result<()> {
            self.order.borrow_mut().push("workflow_post".into());
            Ok(())
        }

        fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
            Vec::new()
        }
    }

    #[test]
    fn test_fixed_traversal_order() {
        let yaml = "on: push\njobs:\n  b:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo 1\n  a:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo 2\n";
        let (wf, _) = decode("w.yml", yaml);
        let config = Config::default();
        let caches = Caches::new();
        let ctx = RuleCtx { filepath: "w.yml", project: None, config: &config, caches: &caches };

        let order = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut rule: Box<dyn Rule> = Box::new(RecordingRule { order: order.clone() });
        walk(&ctx, &wf, std::slice::from_mut(&mut rule)).unwrap();

        // job "a" sorts before "b" regardless of declaration order.
        assert_eq!(
            *order.borrow(),
            vec![
                "workflow_pre",
                "job_pre:a",
                "step:a:None",
                "job_post:a",
                "job_pre:b",
                "step:b:None",
                "job_post:b",
                "workflow_post",
            ]
        );
    }

    #[test]
    fn test_rule_error_aborts_walk() {
        struct Failing;
        impl Rule for Failing {
            fn name(&self) -> &'static str {
                "failing"
            }
            fn visit_workflow_pre(&mut self, _ctx: &RuleCtx, _w: &Workflow) -> anyhow::Result<()> {
                anyhow::bail!("boom")
            }
            fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
                Vec::new()
            }
        }

        let yaml = "on: push\njobs: {}\n";
        let (wf, _) = decode("w.yml", yaml);
        let config = Config::default();
        let caches = Caches::new();
        let ctx = RuleCtx { filepath: "w.yml", project: None, config: &config, caches: &caches };
        let mut rule: Box<dyn Rule> = Box::new(Failing);
        let err = walk(&ctx, &wf, std::slice::from_mut(&mut rule)).unwrap_err();
        assert_eq!(err.rule, "failing");
    }
}
