//! Metadata caches (spec §4.10): thread-safe, project-scoped caches of local
//! action metadata and local reusable-workflow metadata, with negative
//! caching to suppress repeated I/O-error diagnostics.
//!
//! Grounded on the teacher's general registry/caching intent (no single
//! retrieved file matches this shape directly); `parking_lot::RwLock` gives
//! concurrent readers with exclusive, short-held writer sections, matching
//! spec §5's "read-mostly locking" requirement.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;

use sisaku_models::workflow::{ActionMetadata, ReusableWorkflowDocument, WorkflowCall};

use crate::project::Project;

/// Resolution outcome for a single cache entry: looked up once, then cached
/// either as a hit or as a negative (`None`) result.
enum Entry<T> {
    Hit(T),
    Miss,
}

/// `./`-prefixed local action metadata, keyed by the raw `uses:` spec.
pub struct ActionCache {
    entries: RwLock<HashMap<String, Entry<ActionMetadata>>>,
}

impl Default for ActionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionCache {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// Resolves `spec` (e.g. `./.github/actions/build`) against `project`'s
    /// root, reading `action.yml`/`action.yaml`. Missing files or parse
    /// errors are cached as a negative result and yield `None` silently to
    /// the caller after the first lookup (the rule that first triggered the
    /// miss is responsible for emitting the one I/O diagnostic, per spec
    /// §4.13).
    pub fn resolve(&self, project: &Project, spec: &str) -> Option<ActionMetadata> {
        if let Some(hit) = self.peek(spec) {
            return hit;
        }
        let resolved = Self::load(project, spec);
        let mut entries = self.entries.write();
        // First writer wins; a racing reader's equivalent recomputation is
        // harmless (spec §5: "writes are strictly monotone").
        entries
            .entry(spec.to_string())
            .or_insert_with(|| match &resolved {
                Some(meta) => Entry::Hit(meta.clone()),
                None => Entry::Miss,
            });
        resolved
    }

    fn peek(&self, spec: &str) -> Option<Option<ActionMetadata>> {
        match self.entries.read().get(spec) {
            Some(Entry::Hit(meta)) => Some(Some(meta.clone())),
            Some(Entry::Miss) => Some(None),
            None => None,
        }
    }

    fn load(project: &Project, spec: &str) -> Option<ActionMetadata> {
        let rel = spec.strip_prefix("./").unwrap_or(spec);
        let dir = project.root_dir().join(rel);
        for name in ["action.yml", "action.yaml"] {
            let path = dir.join(name);
            match std::fs::read_to_string(&path) {
                Ok(text) => match serde_yaml::from_str(&text) {
                    Ok(meta) => return Some(meta),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to parse local action metadata");
                        return None;
                    }
                },
                Err(_) => continue,
            }
        }
        None
    }

    /// Whether `spec` has already been resolved (hit or negative) in this
    /// cache, without triggering a fresh lookup.
    pub fn is_cached(&self, spec: &str) -> bool {
        self.entries.read().contains_key(spec)
    }
}

/// A local reusable workflow's `on.workflow_call` shape, keyed by its
/// `./…yml` path (normalized relative to the project root).
pub struct WorkflowCache {
    entries: RwLock<HashMap<String, Entry<WorkflowCall>>>,
}

impl Default for WorkflowCache {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowCache {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// Resolves a local `uses: ./…yml` reusable-workflow reference against
    /// `project`'s root.
    pub fn resolve(&self, project: &Project, spec: &str) -> Option<WorkflowCall> {
        if let Some(hit) = self.peek(spec) {
            return hit;
        }
        let resolved = Self::load(project, spec);
        let mut entries = self.entries.write();
        entries
            .entry(spec.to_string())
            .or_insert_with(|| match &resolved {
                Some(wc) => Entry::Hit(wc.clone()),
                None => Entry::Miss,
            });
        resolved
    }

    fn peek(&self, spec: &str) -> Option<Option<WorkflowCall>> {
        match self.entries.read().get(spec) {
            Some(Entry::Hit(wc)) => Some(Some(wc.clone())),
            Some(Entry::Miss) => Some(None),
            None => None,
        }
    }

    fn load(project: &Project, spec: &str) -> Option<WorkflowCall> {
        let rel = spec.strip_prefix("./").unwrap_or(spec);
        let path = project.root_dir().join(rel);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(_) => return None,
        };
        let doc: ReusableWorkflowDocument = match serde_yaml::from_str(&text) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse local reusable workflow");
                return None;
            }
        };
        doc.workflow_call().cloned()
    }

    /// Eagerly self-registers `spec` (this workflow's own path, relative to
    /// its project root) with an already-decoded `workflow_call` shape, so a
    /// sibling workflow that calls it doesn't need to re-read and re-parse
    /// the file from disk (spec §4.10: "populated... eagerly").
    pub fn register(&self, spec: String, call: WorkflowCall) {
        self.entries.write().entry(spec).or_insert(Entry::Hit(call));
    }

    pub fn is_cached(&self, spec: &str) -> bool {
        self.entries.read().contains_key(spec)
    }
}

/// Computes the normalized cache key for a workflow file's own path, relative
/// to `project`'s root, in the `./…` form local `uses:` references use.
pub fn self_key(project: &Project, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(project.root_dir()).ok()?;
    Some(format!("./{}", rel.to_string_lossy().replace('\\', "/")))
}

/// Bundles the two metadata caches; one instance lives per orchestrator run
/// and is shared (non-owning) by every rule (spec §4.12/§9 "Ownership of
/// metadata caches").
#[derive(Default)]
pub struct Caches {
    pub actions: ActionCache,
    pub workflows: WorkflowCache,
}

impl Caches {
    pub fn new() -> Self {
        Self::default()
    }
}
