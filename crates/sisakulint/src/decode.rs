//! YAML → enriched workflow tree decoder (spec §4.7).
//!
//! Positions are resolved eagerly against a [`yamlpath::Document`] at decode
//! time, rather than lazily the way the teacher's `SymbolicLocation`/`Route`
//! machinery does; see `DESIGN.md` for the rationale. Decode errors never
//! abort the run (spec §4.13): a malformed section is skipped and a
//! `"syntax"`-kind diagnostic is appended instead.

use indexmap::IndexMap;
use serde_yaml::Value;

use sisaku_models::workflow::RawYAMLValue;

use crate::position::{Diagnostic, Position};
use crate::tree::*;

const WORKFLOW_KEYS: &[&str] = &[
    "name", "run-name", "on", "permissions", "env", "defaults", "concurrency", "jobs",
];
const JOB_KEYS: &[&str] = &[
    "name", "needs", "runs-on", "permissions", "environment", "concurrency", "outputs", "env",
    "defaults", "if", "steps", "timeout-minutes", "strategy", "continue-on-error", "container",
    "services", "uses", "with", "secrets",
];
const STEP_KEYS: &[&str] = &[
    "id", "if", "name", "run", "shell", "working-directory", "uses", "with", "env",
    "continue-on-error", "timeout-minutes",
];

/// Top-down mapping-key/index path used to resolve a node's position
/// against the original source document.
#[derive(Debug, Clone)]
pub(crate) enum PathSeg {
    Key(String),
    Index(usize),
}

/// A thin wrapper over [`yamlpath::Document`] that resolves a [`PathSeg`]
/// route to a [`Position`], falling back to the document's top-level
/// position when the route can't be resolved (e.g. the path traverses a
/// value that turned out not to be a mapping/sequence at runtime).
pub(crate) struct Source {
    doc: yamlpath::Document,
}

impl Source {
    pub(crate) fn new(text: &str) -> Result<Self, yamlpath::QueryError> {
        Ok(Self { doc: yamlpath::Document::new(text)? })
    }

    fn build_query<'a>(path: &'a [PathSeg]) -> yamlpath::Query<'a> {
        let mut builder = yamlpath::QueryBuilder::new();
        for seg in path {
            builder = match seg {
                PathSeg::Key(k) => builder.key(k.as_str()),
                PathSeg::Index(i) => builder.index(*i),
            };
        }
        builder.build()
    }

    fn feature_pos(&self, feature: &yamlpath::Feature) -> Position {
        let ((row, col), _) = feature.location.point_span;
        Position { line: row + 1, col: col + 1, offset: feature.location.byte_span.0 }
    }

    fn root_pos(&self) -> Position {
        self.doc.top_feature().map(|f| self.feature_pos(&f)).unwrap_or(Position::start())
    }

    /// Position of the value at `path`.
    pub(crate) fn pos(&self, path: &[PathSeg]) -> Position {
        if path.is_empty() {
            return self.root_pos();
        }
        let query = Self::build_query(path);
        match self.doc.query_exact(&query) {
            Ok(Some(feature)) => self.feature_pos(&feature),
            _ => self.root_pos(),
        }
    }

    /// Position of the mapping key itself at `path` (used for
    /// unknown-key/duplicate-id diagnostics, which should point at the key).
    pub(crate) fn key_pos(&self, path: &[PathSeg]) -> Position {
        if path.is_empty() {
            return self.root_pos();
        }
        let query = Self::build_query(path);
        match self.doc.query_key_only(&query) {
            Ok(feature) => self.feature_pos(&feature),
            Err(_) => self.root_pos(),
        }
    }
}

fn push_key(path: &[PathSeg], key: &str) -> Vec<PathSeg> {
    let mut p = path.to_vec();
    p.push(PathSeg::Key(key.to_string()));
    p
}

fn push_index(path: &[PathSeg], idx: usize) -> Vec<PathSeg> {
    let mut p = path.to_vec();
    p.push(PathSeg::Index(idx));
    p
}

fn as_mapping(value: &Value) -> Option<&serde_yaml::Mapping> {
    value.as_mapping()
}

fn key_str(k: &Value) -> Option<&str> {
    k.as_str()
}

fn unknown_keys_diag(
    filepath: &str,
    src: &Source,
    path: &[PathSeg],
    map: &serde_yaml::Mapping,
    allowed: &[&str],
    diags: &mut Vec<Diagnostic>,
) {
    for (k, _) in map {
        let Some(name) = key_str(k) else { continue };
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(name)) {
            let kpath = push_key(path, name);
            diags.push(Diagnostic::new(
                filepath,
                src.key_pos(&kpath),
                "syntax",
                format!("unknown key '{name}'; expected one of: {}", allowed.join(", ")),
            ));
        }
    }
}

fn string_carrier(value: &Value, pos: Position) -> Carrier<String> {
    match value {
        Value::String(s) if s.contains("${{") => Carrier { literal: None, expr: Some(s.clone()), pos },
        Value::String(s) => Carrier { literal: Some(s.clone()), expr: None, pos },
        Value::Bool(b) => Carrier { literal: Some(b.to_string()), expr: None, pos },
        Value::Number(n) => Carrier { literal: Some(n.to_string()), expr: None, pos },
        _ => Carrier { literal: None, expr: None, pos },
    }
}

fn bool_carrier(value: &Value, pos: Position) -> Carrier<bool> {
    match value {
        Value::Bool(b) => Carrier { literal: Some(*b), expr: None, pos },
        Value::String(s) if s.contains("${{") => Carrier { literal: None, expr: Some(s.clone()), pos },
        _ => Carrier { literal: None, expr: None, pos },
    }
}

fn int_carrier(value: &Value, pos: Position) -> Carrier<i64> {
    match value {
        Value::Number(n) if n.is_i64() => Carrier { literal: n.as_i64(), expr: None, pos },
        Value::Number(n) => Carrier { literal: n.as_f64().map(|f| f as i64), expr: None, pos },
        Value::String(s) if s.contains("${{") => Carrier { literal: None, expr: Some(s.clone()), pos },
        _ => Carrier { literal: None, expr: None, pos },
    }
}

fn string_opt(map: &serde_yaml::Mapping, key: &str) -> Option<String> {
    map.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn str_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Sequence(seq) => Some(seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()),
        Value::String(s) => Some(vec![s.clone()]),
        _ => None,
    }
}

/// Decodes a full workflow document. Never fails: unresolvable sections are
/// skipped with a diagnostic instead.
pub fn decode(filepath: &str, text: &str) -> (Workflow, Vec<Diagnostic>) {
    let mut diags = Vec::new();

    let src = match Source::new(text) {
        Ok(s) => s,
        Err(e) => {
            diags.push(Diagnostic::at_start(filepath, "syntax", format!("invalid YAML: {e}")));
            return (empty_workflow(), diags);
        }
    };

    let root: Value = match serde_yaml::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            diags.push(Diagnostic::at_start(filepath, "syntax", format!("invalid YAML: {e}")));
            return (empty_workflow(), diags);
        }
    };

    let path: Vec<PathSeg> = Vec::new();
    let Some(map) = as_mapping(&root) else {
        diags.push(Diagnostic::at_start(filepath, "syntax", "expected a top-level mapping"));
        return (empty_workflow(), diags);
    };

    // GitHub Actions accepts a bare `true` key for `on:` (YAML 1.1 parses
    // unquoted `on` as the boolean `true` in some parsers); normalize it.
    let on_value = map.get("on").or_else(|| {
        map.iter().find_map(|(k, v)| matches!(k, Value::Bool(true)).then_some(v))
    });
    if on_value.is_none() {
        diags.push(Diagnostic::new(filepath, src.pos(&path), "syntax", "missing required key 'on'"));
    }
    if !map.contains_key("jobs") {
        diags.push(Diagnostic::new(filepath, src.pos(&path), "syntax", "missing required key 'jobs'"));
    }
    unknown_keys_diag(filepath, &src, &path, map, WORKFLOW_KEYS, &mut diags);

    let on = on_value.map(|v| decode_events(filepath, &src, &push_key(&path, "on"), v, &mut diags)).unwrap_or_default();

    let permissions = map.get("permissions").map(|v| {
        let p = src.pos(&push_key(&path, "permissions"));
        decode_permissions(filepath, v, p, &mut diags)
    });

    let env = map
        .get("env")
        .and_then(as_mapping)
        .map(|m| decode_env(&push_key(&path, "env"), &src, m))
        .unwrap_or_default();

    let defaults = map.get("defaults").and_then(as_mapping).map(|m| decode_defaults(&push_key(&path, "defaults"), &src, m));
    let concurrency = map.get("concurrency").map(|v| decode_concurrency(&push_key(&path, "concurrency"), &src, v));

    let mut jobs = IndexMap::new();
    if let Some(jobs_map) = map.get("jobs").and_then(as_mapping) {
        let jobs_path = push_key(&path, "jobs");
        let mut seen_ids: Vec<String> = Vec::new();
        for (k, v) in jobs_map {
            let Some(raw_id) = key_str(k) else { continue };
            let id = raw_id.to_lowercase();
            let job_path = push_key(&jobs_path, raw_id);
            if seen_ids.contains(&id) {
                diags.push(Diagnostic::new(
                    filepath,
                    src.key_pos(&job_path),
                    "syntax",
                    format!("duplicate job id '{id}'"),
                ));
                continue;
            }
            seen_ids.push(id.clone());
            if let Some(job_map) = as_mapping(v) {
                let job = decode_job(filepath, &src, &job_path, &id, job_map, &mut diags);
                jobs.insert(id, job);
            } else {
                diags.push(Diagnostic::new(filepath, src.pos(&job_path), "syntax", format!("job '{id}' must be a mapping")));
            }
        }
    }

    let workflow = Workflow {
        name: string_opt(map, "name"),
        run_name: map.get("run-name").map(|v| string_carrier(v, src.pos(&push_key(&path, "run-name")))),
        on,
        permissions,
        env,
        defaults,
        concurrency,
        jobs,
        pos: src.pos(&path),
    };

    (workflow, diags)
}

fn empty_workflow() -> Workflow {
    Workflow {
        name: None,
        run_name: None,
        on: Vec::new(),
        permissions: None,
        env: IndexMap::new(),
        defaults: None,
        concurrency: None,
        jobs: IndexMap::new(),
        pos: Position::start(),
    }
}

fn decode_permissions(
    filepath: &str,
    value: &Value,
    pos: Position,
    diags: &mut Vec<Diagnostic>,
) -> Carrier<sisaku_models::Permissions> {
    match serde_yaml::from_value::<sisaku_models::Permissions>(value.clone()) {
        Ok(p) => Carrier { literal: Some(p), expr: None, pos },
        Err(e) => {
            diags.push(Diagnostic::new(filepath, pos, "syntax", format!("invalid 'permissions': {e}")));
            Carrier { literal: None, expr: None, pos }
        }
    }
}

fn decode_env(path: &[PathSeg], src: &Source, map: &serde_yaml::Mapping) -> IndexMap<String, Carrier<String>> {
    let mut out = IndexMap::new();
    for (k, v) in map {
        let Some(name) = key_str(k) else { continue };
        let p = src.pos(&push_key(path, name));
        out.insert(name.to_string(), string_carrier(v, p));
    }
    out
}

fn decode_defaults(path: &[PathSeg], src: &Source, map: &serde_yaml::Mapping) -> Defaults {
    let run = map.get("run").and_then(as_mapping);
    Defaults {
        shell: run.and_then(|m| string_opt(m, "shell")),
        working_directory: run.and_then(|m| string_opt(m, "working-directory")),
        pos: src.pos(path),
    }
}

fn decode_concurrency(path: &[PathSeg], src: &Source, value: &Value) -> Concurrency {
    let pos = src.pos(path);
    if value.as_str().is_some() {
        return Concurrency { group: Some(string_carrier(value, pos)), cancel_in_progress: None, pos };
    }
    let map = as_mapping(value);
    Concurrency {
        group: map.and_then(|m| m.get("group")).map(|v| string_carrier(v, src.pos(&push_key(path, "group")))),
        cancel_in_progress: map
            .and_then(|m| m.get("cancel-in-progress"))
            .map(|v| bool_carrier(v, src.pos(&push_key(path, "cancel-in-progress")))),
        pos,
    }
}

fn decode_events(
    filepath: &str,
    src: &Source,
    path: &[PathSeg],
    value: &Value,
    diags: &mut Vec<Diagnostic>,
) -> Vec<Event> {
    match value {
        Value::String(s) => vec![Event::Webhook(WebhookEvent { hook: s.clone(), pos: src.pos(path), ..Default::default() })],
        Value::Sequence(seq) => seq
            .iter()
            .enumerate()
            .filter_map(|(i, v)| {
                v.as_str().map(|s| Event::Webhook(WebhookEvent { hook: s.to_string(), pos: src.pos(&push_index(path, i)), ..Default::default() }))
            })
            .collect(),
        Value::Mapping(map) => {
            let mut events = Vec::new();
            for (k, v) in map {
                let Some(name) = key_str(k) else { continue };
                let epath = push_key(path, name);
                let pos = src.pos(&epath);
                match name {
                    "schedule" => {
                        let cron = v
                            .as_sequence()
                            .map(|seq| seq.iter().filter_map(|e| e.get("cron").and_then(|c| c.as_str()).map(str::to_string)).collect())
                            .unwrap_or_default();
                        events.push(Event::Scheduled(ScheduledEvent { cron, pos }));
                    }
                    "workflow_dispatch" => {
                        let mut inputs = IndexMap::new();
                        if let Some(m) = v.as_mapping().and_then(|m| m.get("inputs")).and_then(as_mapping) {
                            let inputs_path = push_key(&epath, "inputs");
                            for (ik, iv) in m {
                                let Some(iname) = key_str(ik) else { continue };
                                let ipath = push_key(&inputs_path, iname);
                                inputs.insert(iname.to_string(), decode_dispatch_input(src, &ipath, iname, iv));
                            }
                        }
                        events.push(Event::WorkflowDispatch(WorkflowDispatchEvent { inputs, pos }));
                    }
                    "repository_dispatch" => {
                        let types = v.as_mapping().and_then(|m| m.get("types")).and_then(str_list).unwrap_or_default();
                        events.push(Event::RepositoryDispatch(RepositoryDispatchEvent { types, pos }));
                    }
                    "workflow_call" => {
                        events.push(Event::WorkflowCall(decode_workflow_call(src, &epath, v)));
                    }
                    _ => {
                        let wmap = v.as_mapping();
                        events.push(Event::Webhook(WebhookEvent {
                            hook: name.to_string(),
                            types: wmap.and_then(|m| m.get("types")).and_then(str_list),
                            branches: wmap.and_then(|m| m.get("branches")).and_then(str_list),
                            branches_ignore: wmap.and_then(|m| m.get("branches-ignore")).and_then(str_list),
                            tags: wmap.and_then(|m| m.get("tags")).and_then(str_list),
                            tags_ignore: wmap.and_then(|m| m.get("tags-ignore")).and_then(str_list),
                            paths: wmap.and_then(|m| m.get("paths")).and_then(str_list),
                            paths_ignore: wmap.and_then(|m| m.get("paths-ignore")).and_then(str_list),
                            workflows: wmap.and_then(|m| m.get("workflows")).and_then(str_list),
                            pos,
                        }));
                    }
                }
            }
            events
        }
        _ => {
            diags.push(Diagnostic::new(filepath, src.pos(path), "syntax", "'on' must be a string, list, or mapping"));
            Vec::new()
        }
    }
}

fn decode_dispatch_input(src: &Source, path: &[PathSeg], name: &str, value: &Value) -> DispatchInput {
    let pos = src.pos(path);
    let map = value.as_mapping();
    let input_type = match map.and_then(|m| m.get("type")).and_then(|v| v.as_str()) {
        Some("string") => DispatchInputType::String,
        Some("number") => DispatchInputType::Number,
        Some("boolean") => DispatchInputType::Boolean,
        Some("choice") => DispatchInputType::Choice,
        Some("environment") => DispatchInputType::Environment,
        _ => DispatchInputType::None,
    };
    DispatchInput {
        name: name.to_string(),
        description: map.and_then(|m| string_opt(m, "description")),
        required: map.and_then(|m| m.get("required")).and_then(|v| v.as_bool()),
        default: map.and_then(|m| m.get("default")).and_then(|v| v.as_str()).map(str::to_string),
        input_type,
        options: map.and_then(|m| m.get("options")).and_then(str_list),
        pos,
    }
}

fn decode_workflow_call(src: &Source, path: &[PathSeg], value: &Value) -> WorkflowCallEvent {
    let pos = src.pos(path);
    let map = value.as_mapping();

    let mut inputs = IndexMap::new();
    if let Some(m) = map.and_then(|m| m.get("inputs")).and_then(as_mapping) {
        let inputs_path = push_key(path, "inputs");
        for (k, v) in m {
            let Some(name) = key_str(k) else { continue };
            let ipath = push_key(&inputs_path, name);
            let ipos = src.pos(&ipath);
            let imap = v.as_mapping();
            let input_type = match imap.and_then(|m| m.get("type")).and_then(|v| v.as_str()) {
                Some("boolean") => Some(WorkflowCallInputType::Boolean),
                Some("number") => Some(WorkflowCallInputType::Number),
                Some("string") => Some(WorkflowCallInputType::String),
                _ => None,
            };
            inputs.insert(
                name.to_string(),
                WorkflowCallEventInput {
                    name: name.to_string(),
                    description: imap.and_then(|m| string_opt(m, "description")),
                    default: imap.and_then(|m| m.get("default")).and_then(|v| v.as_str()).map(str::to_string),
                    required: imap.and_then(|m| m.get("required")).and_then(|v| v.as_bool()),
                    input_type,
                    id: name.to_string(),
                    pos: ipos,
                },
            );
        }
    }

    let mut secrets = IndexMap::new();
    if let Some(m) = map.and_then(|m| m.get("secrets")).and_then(as_mapping) {
        let secrets_path = push_key(path, "secrets");
        for (k, v) in m {
            let Some(name) = key_str(k) else { continue };
            let spos = src.pos(&push_key(&secrets_path, name));
            let smap = v.as_mapping();
            secrets.insert(
                name.to_string(),
                WorkflowCallSecret {
                    description: smap.and_then(|m| string_opt(m, "description")),
                    required: smap.and_then(|m| m.get("required")).and_then(|v| v.as_bool()),
                    pos: spos,
                },
            );
        }
    }

    let mut outputs = IndexMap::new();
    if let Some(m) = map.and_then(|m| m.get("outputs")).and_then(as_mapping) {
        let outputs_path = push_key(path, "outputs");
        for (k, v) in m {
            let Some(name) = key_str(k) else { continue };
            let opos = src.pos(&push_key(&outputs_path, name));
            let omap = v.as_mapping();
            outputs.insert(
                name.to_string(),
                WorkflowCallOutput {
                    description: omap.and_then(|m| string_opt(m, "description")),
                    value: omap.and_then(|m| m.get("value")).and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    pos: opos,
                },
            );
        }
    }

    WorkflowCallEvent { inputs, secrets, outputs, pos }
}

fn decode_job(
    filepath: &str,
    src: &Source,
    path: &[PathSeg],
    id: &str,
    map: &serde_yaml::Mapping,
    diags: &mut Vec<Diagnostic>,
) -> Job {
    let pos = src.pos(path);
    unknown_keys_diag(filepath, src, path, map, JOB_KEYS, diags);

    let has_uses = map.contains_key("uses");
    let has_steps = map.contains_key("steps");
    if !has_uses && !has_steps {
        diags.push(Diagnostic::new(filepath, pos, "syntax", format!("job '{id}' has neither 'steps' nor 'uses'")));
    }

    let needs = map.get("needs").and_then(str_list).unwrap_or_default();

    let runs_on = map.get("runs-on").map(|v| decode_runs_on(v));

    let permissions = map.get("permissions").map(|v| {
        let p = src.pos(&push_key(path, "permissions"));
        decode_permissions(filepath, v, p, diags)
    });

    let outputs = map
        .get("outputs")
        .and_then(as_mapping)
        .map(|m| decode_env(&push_key(path, "outputs"), src, m))
        .unwrap_or_default();

    let env = map
        .get("env")
        .and_then(as_mapping)
        .map(|m| decode_env(&push_key(path, "env"), src, m))
        .unwrap_or_default();

    let defaults = map.get("defaults").and_then(as_mapping).map(|m| decode_defaults(&push_key(path, "defaults"), src, m));
    let concurrency = map.get("concurrency").map(|v| decode_concurrency(&push_key(path, "concurrency"), src, v));

    let cond = map.get("if").map(|v| string_carrier(v, src.pos(&push_key(path, "if"))));
    let timeout_minutes = map.get("timeout-minutes").map(|v| {
        let p = src.pos(&push_key(path, "timeout-minutes"));
        let c = int_carrier(v, p);
        if let Some(n) = c.literal {
            if n < 0 {
                diags.push(Diagnostic::new(filepath, p, "syntax", "'timeout-minutes' must be non-negative"));
            }
        }
        c
    });
    let continue_on_error = map.get("continue-on-error").map(|v| bool_carrier(v, src.pos(&push_key(path, "continue-on-error"))));

    let strategy = map.get("strategy").and_then(as_mapping).map(|m| decode_strategy(filepath, src, &push_key(path, "strategy"), m, diags));

    let container = map.get("container").map(|v| decode_container(src, &push_key(path, "container"), v));

    let mut services = IndexMap::new();
    if let Some(m) = map.get("services").and_then(as_mapping) {
        let services_path = push_key(path, "services");
        for (k, v) in m {
            let Some(name) = key_str(k) else { continue };
            services.insert(name.to_string(), decode_container(src, &push_key(&services_path, name), v));
        }
    }

    let workflow_call = map.get("uses").and_then(|v| v.as_str()).map(|uses| {
        let with = map
            .get("with")
            .and_then(as_mapping)
            .map(|m| decode_env(&push_key(path, "with"), src, m))
            .unwrap_or_default();
        let secrets = match map.get("secrets") {
            Some(Value::String(s)) if s == "inherit" => SecretsArg::Inherit,
            Some(v @ Value::Mapping(_)) => {
                SecretsArg::Map(decode_env(&push_key(path, "secrets"), src, v.as_mapping().unwrap()))
            }
            _ => SecretsArg::None,
        };
        JobWorkflowCall { uses: uses.to_string(), with, secrets, pos: src.pos(&push_key(path, "uses")) }
    });

    let mut steps = Vec::new();
    if let Some(seq) = map.get("steps").and_then(|v| v.as_sequence()) {
        let steps_path = push_key(path, "steps");
        let mut seen: Vec<(String, Position)> = Vec::new();
        for (i, sv) in seq.iter().enumerate() {
            let spath = push_index(&steps_path, i);
            if let Some(smap) = as_mapping(sv) {
                let step = decode_step(filepath, src, &spath, smap, diags);
                if let Some(sid) = &step.id {
                    let lowered = sid.to_lowercase();
                    if let Some((_, first_pos)) = seen.iter().find(|(k, _)| k == &lowered) {
                        diags.push(Diagnostic::new(
                            filepath,
                            step.pos,
                            "syntax",
                            format!("duplicate step id '{lowered}'; first used at line {}", first_pos.line),
                        ));
                    } else {
                        seen.push((lowered, step.pos));
                    }
                }
                steps.push(step);
            }
        }
    }

    Job {
        id: id.to_string(),
        name: string_opt(map, "name"),
        needs,
        runs_on,
        permissions,
        environment: string_opt(map, "environment"),
        concurrency,
        outputs,
        env,
        defaults,
        cond,
        steps,
        timeout_minutes,
        strategy,
        continue_on_error,
        container,
        services,
        workflow_call,
        pos,
    }
}

fn decode_runs_on(value: &Value) -> RunsOn {
    match value {
        Value::String(s) if s.contains("${{") => RunsOn::Expr(s.clone()),
        Value::String(s) => RunsOn::Labels(vec![s.clone()]),
        Value::Sequence(_) => RunsOn::Labels(str_list(value).unwrap_or_default()),
        Value::Mapping(m) => RunsOn::Group {
            group: m.get("group").and_then(|v| v.as_str()).map(str::to_string),
            labels: m.get("labels").and_then(str_list).unwrap_or_default(),
        },
        _ => RunsOn::Labels(Vec::new()),
    }
}

fn decode_strategy(
    filepath: &str,
    src: &Source,
    path: &[PathSeg],
    map: &serde_yaml::Mapping,
    diags: &mut Vec<Diagnostic>,
) -> Strategy {
    let matrix = map.get("matrix").map(|v| decode_matrix(src, &push_key(path, "matrix"), v));
    let max_parallel = map.get("max-parallel").map(|v| {
        let p = src.pos(&push_key(path, "max-parallel"));
        let c = int_carrier(v, p);
        if let Some(n) = c.literal {
            if n < 0 {
                diags.push(Diagnostic::new(filepath, p, "syntax", "'max-parallel' must be non-negative"));
            }
        }
        c
    });
    Strategy {
        matrix,
        fail_fast: map.get("fail-fast").and_then(|v| v.as_bool()),
        max_parallel,
        pos: src.pos(path),
    }
}

fn decode_matrix(src: &Source, path: &[PathSeg], value: &Value) -> Matrix {
    let pos = src.pos(path);
    if let Value::String(s) = value {
        return Matrix { expr: Some(s.clone()), pos, ..Default::default() };
    }
    let Some(map) = as_mapping(value) else {
        return Matrix { pos, ..Default::default() };
    };

    let mut rows = IndexMap::new();
    for (k, v) in map {
        let Some(name) = key_str(k) else { continue };
        if matches!(name, "include" | "exclude") {
            continue;
        }
        let row = match v {
            Value::String(s) if s.contains("${{") => MatrixRow::Expr(s.clone()),
            _ => MatrixRow::Values(
                v.as_sequence()
                    .map(|seq| seq.iter().filter_map(|e| serde_yaml::from_value::<RawYAMLValue>(e.clone()).ok()).collect())
                    .unwrap_or_default(),
            ),
        };
        rows.insert(name.to_string(), row);
    }

    let to_rows = |key: &str| -> Vec<IndexMap<String, RawYAMLValue>> {
        map.get(key)
            .and_then(|v| v.as_sequence())
            .map(|seq| {
                seq.iter()
                    .filter_map(|row| {
                        row.as_mapping().map(|m| {
                            m.iter()
                                .filter_map(|(k, v)| key_str(k).map(|k| (k.to_string(), serde_yaml::from_value::<RawYAMLValue>(v.clone()).unwrap_or(RawYAMLValue::Null))))
                                .collect()
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    };

    Matrix { rows, include: to_rows("include"), exclude: to_rows("exclude"), expr: None, pos }
}

fn decode_container(src: &Source, path: &[PathSeg], value: &Value) -> Container {
    let pos = src.pos(path);
    if value.as_str().is_some() {
        return Container { image: string_carrier(value, pos), credentials: None, env: IndexMap::new(), pos };
    }
    let map = value.as_mapping();
    let image = map
        .and_then(|m| m.get("image"))
        .map(|v| string_carrier(v, src.pos(&push_key(path, "image"))))
        .unwrap_or(Carrier { literal: None, expr: None, pos });
    let credentials = map.and_then(|m| m.get("credentials")).and_then(as_mapping).map(|m| {
        let cpath = push_key(path, "credentials");
        Credentials {
            username: m.get("username").map(|v| string_carrier(v, src.pos(&push_key(&cpath, "username")))),
            password: m.get("password").map(|v| string_carrier(v, src.pos(&push_key(&cpath, "password")))),
            pos: src.pos(&cpath),
        }
    });
    let env = map
        .and_then(|m| m.get("env"))
        .and_then(as_mapping)
        .map(|m| decode_env(&push_key(path, "env"), src, m))
        .unwrap_or_default();
    Container { image, credentials, env, pos }
}

fn decode_step(
    filepath: &str,
    src: &Source,
    path: &[PathSeg],
    map: &serde_yaml::Mapping,
    diags: &mut Vec<Diagnostic>,
) -> Step {
    let pos = src.pos(path);
    unknown_keys_diag(filepath, src, path, map, STEP_KEYS, diags);

    let id = string_opt(map, "id");
    if let Some(sid) = &id {
        if !id_pattern_ok(sid) {
            diags.push(Diagnostic::new(
                filepath,
                src.key_pos(&push_key(path, "id")),
                "syntax",
                format!("step id '{sid}' must match ^[A-Za-z_][A-Za-z0-9_-]*$"),
            ));
        }
    }

    let has_run = map.contains_key("run");
    let has_uses = map.contains_key("uses");
    if has_run && has_uses {
        diags.push(Diagnostic::new(filepath, pos, "syntax", "step has both 'run' and 'uses'; exactly one is allowed"));
    }
    if map.contains_key("working-directory") && has_uses {
        diags.push(Diagnostic::new(filepath, pos, "syntax", "'working-directory' is only valid alongside 'run'"));
    }

    let exec = if has_run {
        let run_pos = src.pos(&push_key(path, "run"));
        Exec::Run(ExecRun {
            run: map.get("run").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            run_pos,
            shell: string_opt(map, "shell"),
            working_directory: string_opt(map, "working-directory"),
        })
    } else {
        let uses_pos = src.pos(&push_key(path, "uses"));
        let inputs = map
            .get("with")
            .and_then(as_mapping)
            .map(|m| decode_env(&push_key(path, "with"), src, m))
            .unwrap_or_default();
        Exec::Action(ExecAction {
            uses: map.get("uses").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            uses_pos,
            inputs,
            entrypoint: string_opt(map, "entrypoint"),
            args: string_opt(map, "args"),
        })
    };

    Step {
        id,
        cond: map.get("if").map(|v| string_carrier(v, src.pos(&push_key(path, "if")))),
        name: string_opt(map, "name"),
        exec,
        env: map
            .get("env")
            .and_then(as_mapping)
            .map(|m| decode_env(&push_key(path, "env"), src, m))
            .unwrap_or_default(),
        continue_on_error: map.get("continue-on-error").map(|v| bool_carrier(v, src.pos(&push_key(path, "continue-on-error")))),
        timeout_minutes: map.get("timeout-minutes").map(|v| int_carrier(v, src.pos(&push_key(path, "timeout-minutes")))),
        pos,
    }
}

pub(crate) fn id_pattern_ok(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_workflow_decodes() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo hi\n";
        let (wf, diags) = decode("w.yml", yaml);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(wf.jobs.len(), 1);
        assert!(wf.jobs.contains_key("build"));
    }

    #[test]
    fn test_missing_on_and_jobs_diagnosed() {
        let yaml = "name: x\n";
        let (_, diags) = decode("w.yml", yaml);
        assert!(diags.iter().any(|d| d.message.contains("'on'")));
        assert!(diags.iter().any(|d| d.message.contains("'jobs'")));
    }

    #[test]
    fn test_unknown_top_level_key_diagnosed() {
        let yaml = "on: push\njobs: {}\nbogus: 1\n";
        let (_, diags) = decode("w.yml", yaml);
        assert!(diags.iter().any(|d| d.message.contains("unknown key 'bogus'")));
    }

    #[test]
    fn test_job_ids_lowercased() {
        let yaml = "on: push\njobs:\n  Build:\n    runs-on: ubuntu-latest\n    steps: []\n";
        let (wf, _) = decode("w.yml", yaml);
        assert!(wf.jobs.contains_key("build"));
    }

    #[test]
    fn test_duplicate_job_id_diagnosed() {
        let yaml = "on: push\njobs:\n  build: {runs-on: ubuntu-latest, steps: []}\n  BUILD: {runs-on: ubuntu-latest, steps: []}\n";
        let (_, diags) = decode("w.yml", yaml);
        assert!(diags.iter().any(|d| d.message.contains("duplicate job id")));
    }

    #[test]
    fn test_run_and_uses_mutually_exclusive() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo hi\n        uses: actions/checkout@v4\n";
        let (_, diags) = decode("w.yml", yaml);
        assert!(diags.iter().any(|d| d.message.contains("'run' and 'uses'")));
    }

    #[test]
    fn test_duplicate_step_id_diagnosed() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    steps:\n      - id: Build\n        run: echo 1\n      - id: build\n        run: echo 2\n";
        let (wf, diags) = decode("w.yml", yaml);
        assert_eq!(wf.jobs["build"].steps.len(), 2);
        assert!(diags.iter().any(|d| d.message.contains("duplicate step id")));
    }

    #[test]
    fn test_workflow_call_input_missing_type_not_a_decode_error() {
        let yaml = "on:\n  workflow_call:\n    inputs:\n      foo: {required: true}\njobs: {}\n";
        let (wf, _) = decode("w.yml", yaml);
        let Event::WorkflowCall(wc) = &wf.on[0] else { panic!("expected workflow_call event") };
        assert!(wc.inputs["foo"].input_type.is_none());
    }

    #[test]
    fn test_negative_timeout_diagnosed() {
        let yaml = "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    timeout-minutes: -5\n    steps: []\n";
        let (_, diags) = decode("w.yml", yaml);
        assert!(diags.iter().any(|d| d.message.contains("non-negative")));
    }

    #[test]
    fn test_id_pattern() {
        assert!(id_pattern_ok("build_1"));
        assert!(id_pattern_ok("_x-y"));
        assert!(!id_pattern_ok("1abc"));
        assert!(!id_pattern_ok("has space"));
    }
}
