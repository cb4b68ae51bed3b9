//! Permissions rule (spec §4.9 / §3): validates `permissions:` at workflow
//! and job level against the fixed scope set.

use sisaku_models::{BasePermission, Permissions, PERMISSION_SCOPES};

use crate::position::Diagnostic;
use crate::tree::{Carrier, Job, Workflow};
use crate::walker::{Rule, RuleCtx};

pub struct PermissionsRule {
    diagnostics: Vec<Diagnostic>,
}

impl PermissionsRule {
    pub fn new() -> Self {
        Self { diagnostics: Vec::new() }
    }

    fn check(&mut self, ctx: &RuleCtx, carrier: &Carrier<Permissions>) {
        let Some(perms) = &carrier.literal else {
            return;
        };
        match perms {
            Permissions::Base(BasePermission::ReadAll) => {
                self.diagnostics.push(Diagnostic::new(
                    ctx.filepath,
                    carrier.pos,
                    "permissions",
                    "'read-all' grants broader read access than most workflows need; prefer an explicit per-scope mapping",
                ));
            }
            Permissions::Base(BasePermission::WriteAll) => {
                self.diagnostics.push(Diagnostic::new(
                    ctx.filepath,
                    carrier.pos,
                    "permissions",
                    "'write-all' grants broader write access than most workflows need; prefer an explicit per-scope mapping",
                ));
            }
            Permissions::Base(BasePermission::Default) => {}
            Permissions::Explicit(scopes) => {
                for scope in scopes.keys() {
                    if !PERMISSION_SCOPES.contains(&scope.as_str()) {
                        self.diagnostics.push(Diagnostic::new(
                            ctx.filepath,
                            carrier.pos,
                            "permissions",
                            format!("'{scope}' is not a recognized permission scope"),
                        ));
                    }
                }
            }
        }
    }
}

impl Rule for PermissionsRule {
    fn name(&self) -> &'static str {
        "permissions"
    }

    fn visit_workflow_pre(&mut self, ctx: &RuleCtx, workflow: &Workflow) -> anyhow::Result<()> {
        if let Some(perms) = &workflow.permissions {
            self.check(ctx, perms);
        }
        Ok(())
    }

    fn visit_job_pre(&mut self, ctx: &RuleCtx, job: &Job) -> anyhow::Result<()> {
        if let Some(perms) = &job.permissions {
            self.check(ctx, perms);
        }
        Ok(())
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
