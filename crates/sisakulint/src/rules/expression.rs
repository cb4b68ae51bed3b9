//! Expression rule (spec §4.9): runs the §4.5 checker over every `${{...}}`
//! occurrence in the tree, maintaining the per-job context environment
//! (matrix/needs/steps type synthesis) as the walker visits.

use indexmap::IndexMap;

use sisaku_expr::{Env, ObjectType, Type};
use sisaku_models::workflow::RawYAMLValue;

use crate::position::{Diagnostic, Position};
use crate::tree::{Carrier, Job, Matrix, MatrixRow, RunsOn, Step, Workflow};
use crate::walker::{Rule, RuleCtx};

use super::{advance_position, expr_fragments};

pub struct ExpressionRule {
    diagnostics: Vec<Diagnostic>,
    base_env: Env,
    job_env: Option<Env>,
    /// Every job's declared `outputs:` names, as a strict object type,
    /// precomputed once per workflow so `needs` type synthesis doesn't
    /// need the whole tree threaded through every later hook.
    job_outputs: std::collections::BTreeMap<String, Type>,
    /// Step ids accumulated so far within the current job, in declaration
    /// order; `None` once an expression-bearing id switches the shape loose.
    steps_acc: Option<IndexMap<String, Type>>,
    steps_loose: bool,
}

impl ExpressionRule {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
            base_env: Env::new(),
            job_env: None,
            job_outputs: std::collections::BTreeMap::new(),
            steps_acc: Some(IndexMap::new()),
            steps_loose: false,
        }
    }

    fn check_carrier(
        &mut self,
        ctx: &RuleCtx,
        env: &Env,
        carrier: &Carrier<String>,
        contexts: &[&str],
        special_functions: &[&str],
    ) {
        let Some(text) = &carrier.expr else {
            return;
        };
        let mut scoped = env.clone();
        scoped.set_context_availability(contexts.iter().map(|s| s.to_string()).collect());
        scoped
            .set_special_function_availability(special_functions.iter().map(|s| s.to_string()).collect());
        scoped.set_config_vars(ctx.config.config_variables.clone());

        for (offset, body) in expr_fragments(text) {
            let pos = advance_position(carrier.pos, text, offset);
            match sisaku_expr::parse(body) {
                Ok(expr) => {
                    let (_, diags) = scoped.check(&expr);
                    for d in diags {
                        self.diagnostics.push(Diagnostic::new(
                            ctx.filepath,
                            Position { line: pos.line, col: pos.col, offset: pos.offset + d.pos.offset },
                            "expression",
                            d.message,
                        ));
                    }
                }
                Err(e) => {
                    self.diagnostics.push(Diagnostic::new(ctx.filepath, pos, "syntax", e.to_string()));
                }
            }
        }
    }

    fn check_str_carrier(&mut self, ctx: &RuleCtx, env: &Env, carrier: &Carrier<String>, contexts: &[&str]) {
        self.check_carrier(ctx, env, carrier, contexts, &[]);
    }
}

/// Contexts allowed inside a step's `if:`/`run:`/`with:` per the workflow-key
/// availability table; special functions (`success()`, `always()`, ...) are
/// only meaningful at `if:`.
const STEP_LEVEL_CONTEXTS: &[&str] = &[
    "github", "env", "job", "steps", "runner", "secrets", "strategy", "matrix", "needs", "inputs", "vars",
];
const STEP_IF_SPECIAL_FUNCTIONS: &[&str] = &["success", "always", "failure", "cancelled", "canceled"];
const JOB_LEVEL_CONTEXTS: &[&str] =
    &["github", "env", "job", "needs", "strategy", "matrix", "vars", "secrets", "inputs"];
const WORKFLOW_LEVEL_CONTEXTS: &[&str] = &["github", "env", "vars", "inputs"];
const RUNS_ON_CONTEXTS: &[&str] = &["github", "needs", "strategy", "matrix", "vars", "inputs"];

fn synth_raw_value_type(v: &RawYAMLValue) -> Type {
    match v {
        RawYAMLValue::Null => Type::Null,
        RawYAMLValue::Bool(_) => Type::Bool,
        RawYAMLValue::Number(_) => Type::Number,
        RawYAMLValue::String(_) => Type::String,
        RawYAMLValue::Sequence(_) => Type::array(Type::Unknown),
        RawYAMLValue::Mapping(m) => Type::object(ObjectType::strict(
            m.iter().map(|(k, v)| (k.clone(), synth_raw_value_type(v))),
        )),
    }
}

fn synth_matrix_type(matrix: &Matrix) -> Type {
    if matrix.expr.is_some() {
        return Type::object(ObjectType::loose());
    }
    let mut props = std::collections::BTreeMap::new();
    for (name, row) in &matrix.rows {
        let ty = match row {
            MatrixRow::Expr(_) => Type::Unknown,
            MatrixRow::Values(values) => values
                .iter()
                .map(synth_raw_value_type)
                .fold(Type::Unknown, |acc, t| Type::merge(&acc, &t)),
        };
        props.insert(name.clone(), ty);
    }
    for include in &matrix.include {
        for (k, v) in include {
            let ty = synth_raw_value_type(v);
            props
                .entry(k.clone())
                .and_modify(|existing| *existing = Type::merge(existing, &ty))
                .or_insert(ty);
        }
    }
    Type::object(ObjectType { props, mapped: None })
}

fn synth_needs_type(job_outputs: &std::collections::BTreeMap<String, Type>, job: &Job) -> Type {
    let mut props = std::collections::BTreeMap::new();
    for needed_id in &job.needs {
        let key = needed_id.to_lowercase();
        let outputs = job_outputs.get(&key).cloned().unwrap_or_else(|| Type::object(ObjectType::loose()));
        let shape = Type::object(ObjectType::strict([
            ("outputs".to_string(), outputs),
            ("result".to_string(), Type::String),
        ]));
        props.insert(key, shape);
    }
    Type::object(ObjectType { props, mapped: None })
}

fn step_output_shape(ctx: &RuleCtx, step: &Step) -> Type {
    use crate::tree::Exec;
    let outputs = match &step.exec {
        Exec::Action(action) => {
            if action.uses.starts_with("actions/github-script") {
                Type::object(ObjectType::loose())
            } else if let Some(project) = ctx.project {
                match sisaku_models::Uses::parse(action.uses.clone()) {
                    Ok(sisaku_models::Uses::Local(_)) => match ctx.caches.actions.resolve(project, &action.uses) {
                        Some(meta) => Type::object(ObjectType::strict(
                            meta.outputs.keys().map(|k| (k.clone(), Type::String)),
                        )),
                        None => Type::object(ObjectType::loose()),
                    },
                    _ => Type::object(ObjectType::loose()),
                }
            } else {
                Type::object(ObjectType::loose())
            }
        }
        Exec::Run(_) => Type::object(ObjectType::loose()),
    };
    Type::object(ObjectType::strict([
        ("outputs".to_string(), outputs),
        ("conclusion".to_string(), Type::String),
        ("outcome".to_string(), Type::String),
    ]))
}

impl Rule for ExpressionRule {
    fn name(&self) -> &'static str {
        "expression"
    }

    fn visit_workflow_pre(&mut self, ctx: &RuleCtx, workflow: &Workflow) -> anyhow::Result<()> {
        self.job_outputs = workflow
            .jobs
            .iter()
            .map(|(id, job)| {
                let outputs = Type::object(ObjectType::strict(
                    job.outputs.keys().map(|k| (k.clone(), Type::String)),
                ));
                (id.clone(), outputs)
            })
            .collect();

        if let Some(run_name) = &workflow.run_name {
            self.check_str_carrier(ctx, &self.base_env.clone(), run_name, &["github", "inputs", "vars"]);
        }
        for (_, value) in &workflow.env {
            self.check_str_carrier(ctx, &self.base_env.clone(), value, WORKFLOW_LEVEL_CONTEXTS);
        }
        if let Some(concurrency) = &workflow.concurrency {
            if let Some(group) = &concurrency.group {
                self.check_str_carrier(ctx, &self.base_env.clone(), group, WORKFLOW_LEVEL_CONTEXTS);
            }
        }
        Ok(())
    }

    fn visit_job_pre(&mut self, ctx: &RuleCtx, job: &Job) -> anyhow::Result<()> {
        self.steps_acc = Some(IndexMap::new());
        self.steps_loose = false;

        let mut env = self.base_env.clone();
        if let Some(strategy) = &job.strategy {
            if let Some(matrix) = &strategy.matrix {
                env.update_matrix(synth_matrix_type(matrix));
            }
        }
        env.update_needs(synth_needs_type(&self.job_outputs, job));

        // `runs-on:` carries no `Position` of its own (unlike every other
        // checkable field); anchor any diagnostic to the job's own position.
        if let Some(RunsOn::Expr(expr)) = &job.runs_on {
            let carrier = Carrier { literal: Some(expr.clone()), expr: Some(expr.clone()), pos: job.pos };
            self.check_str_carrier(ctx, &env, &carrier, RUNS_ON_CONTEXTS);
        }

        if let Some(cond) = &job.cond {
            self.check_carrier(ctx, &env, cond, JOB_LEVEL_CONTEXTS, STEP_IF_SPECIAL_FUNCTIONS);
        }
        for (_, value) in &job.env {
            self.check_str_carrier(ctx, &env, value, JOB_LEVEL_CONTEXTS);
        }
        if let Some(concurrency) = &job.concurrency {
            if let Some(group) = &concurrency.group {
                self.check_str_carrier(ctx, &env, group, JOB_LEVEL_CONTEXTS);
            }
        }

        self.job_env = Some(env);
        Ok(())
    }

    fn visit_step(&mut self, ctx: &RuleCtx, _job: &Job, step: &Step) -> anyhow::Result<()> {
        // Refresh the steps context to reflect everything accumulated from
        // prior steps in this job before checking this step's own carriers.
        if let Some(env) = &mut self.job_env {
            if self.steps_loose {
                env.update_steps(Type::object(ObjectType::loose()));
            } else if let Some(acc) = &self.steps_acc {
                env.update_steps(Type::object(ObjectType::strict(
                    acc.iter().map(|(k, v)| (k.clone(), v.clone())),
                )));
            }
        }
        let env = self.job_env.clone().unwrap_or_default();

        if let Some(cond) = &step.cond {
            self.check_carrier(ctx, &env, cond, STEP_LEVEL_CONTEXTS, STEP_IF_SPECIAL_FUNCTIONS);
        }
        for (_, value) in &step.env {
            self.check_str_carrier(ctx, &env, value, STEP_LEVEL_CONTEXTS);
        }
        match &step.exec {
            crate::tree::Exec::Run(run) => {
                let carrier = Carrier { literal: Some(run.run.clone()), expr: Some(run.run.clone()), pos: run.run_pos };
                self.check_str_carrier(ctx, &env, &carrier, STEP_LEVEL_CONTEXTS);
            }
            crate::tree::Exec::Action(action) => {
                for (_, value) in &action.inputs {
                    self.check_str_carrier(ctx, &env, value, STEP_LEVEL_CONTEXTS);
                }
            }
        }

        // Accumulate this step's shape for subsequent steps in the job.
        if let Some(id) = &step.id {
            if self.steps_loose {
                // already loose; nothing more to track precisely
            } else if id.contains("${{") {
                self.steps_loose = true;
                self.steps_acc = None;
            } else if let Some(acc) = &mut self.steps_acc {
                acc.insert(id.to_lowercase(), step_output_shape(ctx, step));
            }
        }
        Ok(())
    }

    fn visit_job_post(&mut self, ctx: &RuleCtx, job: &Job) -> anyhow::Result<()> {
        // `outputs:` values are evaluated after every step has run, so they
        // see the fully-accumulated `steps` context.
        if let Some(env) = &mut self.job_env {
            if self.steps_loose {
                env.update_steps(Type::object(ObjectType::loose()));
            } else if let Some(acc) = &self.steps_acc {
                env.update_steps(Type::object(ObjectType::strict(
                    acc.iter().map(|(k, v)| (k.clone(), v.clone())),
                )));
            }
        }
        let env = self.job_env.clone().unwrap_or_default();
        for (_, value) in &job.outputs {
            self.check_str_carrier(ctx, &env, value, STEP_LEVEL_CONTEXTS);
        }

        self.job_env = None;
        self.steps_acc = Some(IndexMap::new());
        self.steps_loose = false;
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
        let mut rule: Box<dyn Rule> = Box::new(ExpressionRule::new());
        walk(&ctx, &wf, std::slice::from_mut(&mut rule)).unwrap()
    }

    #[test]
    fn test_undefined_context_in_run() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo ${{ bogus.value }}\n";
        let diags = run_rule(yaml);
        assert!(diags.iter().any(|d| d.message.contains("undefined variable")));
    }

    #[test]
    fn test_untrusted_input_flagged_in_run() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo ${{ github.event.issue.title }}\n";
        let diags = run_rule(yaml);
        assert!(diags.iter().any(|d| d.message.contains("untrusted input")));
    }

    #[test]
    fn test_format_arity_mismatch() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo ${{ format('hello {0} {2}', 'a', 'b') }}\n";
        let diags = run_rule(yaml);
        assert!(diags.iter().any(|d| d.message.contains("{1} is missing")));
        assert!(diags.iter().any(|d| d.message.contains("placeholder {2} has no argument")));
    }

    #[test]
    fn test_matrix_property_resolves() {
        let yaml = "on: push\njobs:\n  build:\n    strategy:\n      matrix:\n        os: [ubuntu-latest, macos-latest]\n    runs-on: ${{ matrix.os }}\n    steps:\n      - run: echo ${{ matrix.os }}\n";
        let diags = run_rule(yaml);
        assert!(!diags.iter().any(|d| d.message.contains("undefined variable")));
    }
}
