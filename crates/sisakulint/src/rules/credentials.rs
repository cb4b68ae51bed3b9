//! Credentials rule (spec §4.9): flags plaintext passwords in
//! `container.credentials`/`services.*.credentials`; these must reference a
//! secret via an expression, never a literal string.

use crate::position::Diagnostic;
use crate::tree::{Container, Job};
use crate::walker::{Rule, RuleCtx};

pub struct CredentialsRule {
    diagnostics: Vec<Diagnostic>,
}

impl CredentialsRule {
    pub fn new() -> Self {
        Self { diagnostics: Vec::new() }
    }

    fn check_container(&mut self, ctx: &RuleCtx, name: &str, container: &Container) {
        let Some(creds) = &container.credentials else {
            return;
        };
        if let Some(password) = &creds.password {
            if password.literal.is_some() && !password.is_expr() {
                self.diagnostics.push(Diagnostic::new(
                    ctx.filepath,
                    password.pos,
                    "credentials",
                    format!("plaintext password in '{name}.credentials'; reference a secret with an expression instead"),
                ));
            }
        }
        if let Some(username) = &creds.username {
            if username.literal.is_some() && !username.is_expr() {
                self.diagnostics.push(Diagnostic::new(
                    ctx.filepath,
                    username.pos,
                    "credentials",
                    format!("plaintext username in '{name}.credentials'; reference a secret or variable with an expression instead"),
                ));
            }
        }
    }
}

impl Rule for CredentialsRule {
    fn name(&self) -> &'static str {
        "credentials"
    }

    fn visit_job_pre(&mut self, ctx: &RuleCtx, job: &Job) -> anyhow::Result<()> {
        if let Some(container) = &job.container {
            self.check_container(ctx, "container", container);
        }
        for (name, service) in &job.services {
            self.check_container(ctx, &format!("services.{name}"), service);
        }
        Ok(())
    }

    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
