//! Sub-schemas that are decoded directly via `serde` rather than walked by
//! hand: event trigger bodies, matrix row values, and action/reusable-
//! workflow metadata. The top-level `Workflow`/`Job`/`Step` tree (which
//! needs per-key diagnostics and positions) is hand-decoded in `sisakulint`
//! instead; see its `decode` module.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::common::{Env, Permissions};

/// `on:` may be a bare event name, a list of bare event names, or a mapping
/// of event name to its configuration (or `null`, meaning "default config").
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum Trigger {
    BareEvent(String),
    BareEvents(Vec<String>),
    Events(Box<Events>),
}

/// A `T` or `null` (an event enabled with no explicit configuration, e.g.
/// bare `push:`).
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum OptionalBody<T> {
    Null,
    Body(T),
}

impl<T> OptionalBody<T> {
    pub fn body(&self) -> Option<&T> {
        match self {
            OptionalBody::Null => None,
            OptionalBody::Body(t) => Some(t),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Events {
    pub schedule: Option<Vec<ScheduleEvent>>,
    pub workflow_dispatch: Option<OptionalBody<WorkflowDispatch>>,
    pub repository_dispatch: Option<OptionalBody<RepositoryDispatch>>,
    pub workflow_call: Option<OptionalBody<WorkflowCall>>,
    /// Every other (webhook-style) trigger: `push`, `pull_request`,
    /// `pull_request_target`, `issues`, `discussion`, etc.
    #[serde(flatten)]
    pub webhooks: IndexMap<String, OptionalBody<WebhookEvent>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ScheduleEvent {
    pub cron: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct WebhookEvent {
    #[serde(default)]
    pub types: Option<Vec<String>>,
    #[serde(default)]
    pub branches: Option<Vec<String>>,
    #[serde(default)]
    pub branches_ignore: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub tags_ignore: Option<Vec<String>>,
    #[serde(default)]
    pub paths: Option<Vec<String>>,
    #[serde(default)]
    pub paths_ignore: Option<Vec<String>>,
    #[serde(default)]
    pub workflows: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct WorkflowDispatch {
    #[serde(default)]
    pub inputs: IndexMap<String, DispatchInput>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RepositoryDispatch {
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct WorkflowCall {
    #[serde(default)]
    pub inputs: IndexMap<String, WorkflowCallEventInput>,
    #[serde(default)]
    pub secrets: IndexMap<String, WorkflowCallSecret>,
    #[serde(default)]
    pub outputs: IndexMap<String, WorkflowCallOutput>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WorkflowCallSecret {
    pub description: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct WorkflowCallOutput {
    pub description: Option<String>,
    pub value: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct DispatchInput {
    pub description: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub r#type: Option<DispatchInputType>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DispatchInputType {
    String,
    Number,
    Boolean,
    Choice,
    Environment,
}

/// A `workflow_call` input. `r#type` is `Option` only so that its absence
/// can be diagnosed by the caller (spec §3: "absence is a diagnostic");
/// GitHub Actions itself requires the key.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct WorkflowCallEventInput {
    pub description: Option<String>,
    #[serde(default)]
    pub default: Option<crate::common::EnvValue>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub r#type: Option<WorkflowCallInputType>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowCallInputType {
    Boolean,
    Number,
    String,
}

/// A raw YAML scalar/sequence/mapping, used where a value's shape (not its
/// schema) drives type synthesis — chiefly `strategy.matrix` rows.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RawYAMLValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Sequence(Vec<RawYAMLValue>),
    Mapping(IndexMap<String, RawYAMLValue>),
}

/// The declared metadata of a local composite/JavaScript/Docker action,
/// read from its `action.yml`/`action.yaml`.
#[derive(Deserialize, Debug, Clone)]
pub struct ActionMetadata {
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: IndexMap<String, ActionInputMetadata>,
    #[serde(default)]
    pub outputs: IndexMap<String, ActionOutputMetadata>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ActionInputMetadata {
    pub description: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ActionOutputMetadata {
    pub description: Option<String>,
}

/// The subset of a target workflow's document needed to resolve it as a
/// reusable workflow: just its `on.workflow_call` event.
#[derive(Deserialize, Debug, Clone)]
pub struct ReusableWorkflowDocument {
    pub on: Trigger,
}

impl ReusableWorkflowDocument {
    pub fn workflow_call(&self) -> Option<&WorkflowCall> {
        match &self.on {
            Trigger::Events(events) => events.workflow_call.as_ref().and_then(OptionalBody::body),
            _ => None,
        }
    }
}

/// `env:` values accept native YAML scalar types (spec §3 "string-carrier
/// types"); re-exported here for callers that only need the raw mapping.
pub type EnvMap = Env;

/// `permissions:` re-exported alongside the workflow sub-schemas for
/// convenience; the canonical definition lives in [`crate::common`].
pub type WorkflowPermissions = Permissions;
