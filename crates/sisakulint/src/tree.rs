//! The enriched workflow syntax tree (spec §3 / §4.7).
//!
//! Produced once by [`crate::decode::decode`] and immutable thereafter;
//! consumed by the tree walker and every rule.

use indexmap::IndexMap;

use sisaku_models::workflow::RawYAMLValue;

use crate::position::Position;

/// A value that may be a literal `T`, an `${{ ... }}` expression, or both
/// absent (e.g. a key that wasn't present at all is simply `None` at its
/// call site; this wraps the present-but-possibly-expression case).
#[derive(Debug, Clone, PartialEq)]
pub struct Carrier<T> {
    pub literal: Option<T>,
    /// The full `${{ ... }}` fragment(s) found in the scalar, if any.
    pub expr: Option<String>,
    pub pos: Position,
}

impl<T> Carrier<T> {
    pub fn is_expr(&self) -> bool {
        self.expr.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    pub name: Option<String>,
    pub run_name: Option<Carrier<String>>,
    pub on: Vec<Event>,
    pub permissions: Option<Carrier<sisaku_models::Permissions>>,
    pub env: IndexMap<String, Carrier<String>>,
    pub defaults: Option<Defaults>,
    pub concurrency: Option<Concurrency>,
    /// Job ids are lowercased; original casing lives on [`Job::name`]'s
    /// carrier or, absent a `name:`, is reconstructed from the YAML key.
    pub jobs: IndexMap<String, Job>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Webhook(WebhookEvent),
    Scheduled(ScheduledEvent),
    WorkflowDispatch(WorkflowDispatchEvent),
    RepositoryDispatch(RepositoryDispatchEvent),
    WorkflowCall(WorkflowCallEvent),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WebhookEvent {
    pub hook: String,
    pub types: Option<Vec<String>>,
    pub branches: Option<Vec<String>>,
    pub branches_ignore: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub tags_ignore: Option<Vec<String>>,
    pub paths: Option<Vec<String>>,
    pub paths_ignore: Option<Vec<String>>,
    pub workflows: Option<Vec<String>>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub cron: Vec<String>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDispatchEvent {
    pub inputs: IndexMap<String, DispatchInput>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryDispatchEvent {
    pub types: Vec<String>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowCallEvent {
    pub inputs: IndexMap<String, WorkflowCallEventInput>,
    pub secrets: IndexMap<String, WorkflowCallSecret>,
    pub outputs: IndexMap<String, WorkflowCallOutput>,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchInputType {
    None,
    String,
    Number,
    Boolean,
    Choice,
    Environment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchInput {
    pub name: String,
    pub description: Option<String>,
    pub required: Option<bool>,
    pub default: Option<String>,
    pub input_type: DispatchInputType,
    pub options: Option<Vec<String>>,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowCallInputType {
    Boolean,
    Number,
    String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowCallEventInput {
    pub name: String,
    pub description: Option<String>,
    pub default: Option<String>,
    pub required: Option<bool>,
    /// `None` when the (mandatory) `type:` key was absent; the decoder
    /// still emits a diagnostic for that, per spec §3.
    pub input_type: Option<WorkflowCallInputType>,
    pub id: String,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowCallSecret {
    pub description: Option<String>,
    pub required: Option<bool>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowCallOutput {
    pub description: Option<String>,
    pub value: String,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunsOn {
    Labels(Vec<String>),
    Expr(String),
    Group { group: Option<String>, labels: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    pub shell: Option<String>,
    pub working_directory: Option<String>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Concurrency {
    pub group: Option<Carrier<String>>,
    pub cancel_in_progress: Option<Carrier<bool>>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatrixRow {
    Values(Vec<RawYAMLValue>),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    pub rows: IndexMap<String, MatrixRow>,
    pub include: Vec<IndexMap<String, RawYAMLValue>>,
    pub exclude: Vec<IndexMap<String, RawYAMLValue>>,
    /// Set when `matrix:` itself is a bare `${{ ... }}` expression rather
    /// than a mapping of rows.
    pub expr: Option<String>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Strategy {
    pub matrix: Option<Matrix>,
    pub fail_fast: Option<bool>,
    pub max_parallel: Option<Carrier<i64>>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub username: Option<Carrier<String>>,
    pub password: Option<Carrier<String>>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub image: Carrier<String>,
    pub credentials: Option<Credentials>,
    pub env: IndexMap<String, Carrier<String>>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SecretsArg {
    Inherit,
    Map(IndexMap<String, Carrier<String>>),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobWorkflowCall {
    pub uses: String,
    pub with: IndexMap<String, Carrier<String>>,
    pub secrets: SecretsArg,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub name: Option<String>,
    pub needs: Vec<String>,
    pub runs_on: Option<RunsOn>,
    pub permissions: Option<Carrier<sisaku_models::Permissions>>,
    pub environment: Option<String>,
    pub concurrency: Option<Concurrency>,
    pub outputs: IndexMap<String, Carrier<String>>,
    pub env: IndexMap<String, Carrier<String>>,
    pub defaults: Option<Defaults>,
    pub cond: Option<Carrier<String>>,
    pub steps: Vec<Step>,
    pub timeout_minutes: Option<Carrier<i64>>,
    pub strategy: Option<Strategy>,
    pub continue_on_error: Option<Carrier<bool>>,
    pub container: Option<Container>,
    pub services: IndexMap<String, Container>,
    pub workflow_call: Option<JobWorkflowCall>,
    pub pos: Position,
}

impl Job {
    pub fn is_reusable(&self) -> bool {
        self.workflow_call.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecRun {
    pub run: String,
    pub run_pos: Position,
    pub shell: Option<String>,
    pub working_directory: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecAction {
    pub uses: String,
    pub uses_pos: Position,
    pub inputs: IndexMap<String, Carrier<String>>,
    pub entrypoint: Option<String>,
    pub args: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Exec {
    Run(ExecRun),
    Action(ExecAction),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub id: Option<String>,
    pub cond: Option<Carrier<String>>,
    pub name: Option<String>,
    pub exec: Exec,
    pub env: IndexMap<String, Carrier<String>>,
    pub continue_on_error: Option<Carrier<bool>>,
    pub timeout_minutes: Option<Carrier<i64>>,
    pub pos: Position,
}
