//! Conditional rule (spec §4.9 scenario 1): flags `if:` values that mix a
//! `${{...}}` expression with surrounding text. The runtime only treats a
//! sole `${{...}}` as a boolean expression; anything else (including
//! `${{ false }} || extra`) is coerced to a non-empty string and therefore
//! always evaluates truthy.

use crate::position::Diagnostic;
use crate::tree::{Carrier, Job, Step};
use crate::walker::{Rule, RuleCtx};

use super::is_sole_expression;

pub struct ConditionalRule {
    diagnostics: Vec<Diagnostic>,
}

impl ConditionalRule {
    pub fn new() -> Self {
        Self { diagnostics: Vec::new() }
    }

    fn check(&mut self, ctx: &RuleCtx, cond: &Carrier<String>) {
        let Some(text) = &cond.expr else {
            return;
        };
        if text.contains("${{") && !is_sole_expression(text) {
            self.diagnostics.push(Diagnostic::new(
                ctx.filepath,
                cond.pos,
                "conditional",
                "condition always evaluates to true: an `if:` value that mixes an expression with other text is coerced to a non-empty string, not evaluated as the expression's boolean result",
            ));
        }
    }
}

impl Rule for ConditionalRule {
    fn name(&self) -> &'static str {
        "conditional"
    }

    fn visit_job_pre(&mut self, ctx: &RuleCtx, job: &Job) -> anyhow::Result<()> {
        if let Some(cond) = &job.cond {
            self.check(ctx, cond);
        }
        Ok(())
    }

    fn visit_step(&mut self, ctx: &RuleCtx, _job: &Job, step: &Step) -> anyhow::Result<()> {
        if let Some(cond) = &step.cond {
            self.check(ctx, cond);
        }
        Ok(())
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
