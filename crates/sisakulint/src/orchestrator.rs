//! The orchestrator (spec §4.12): schedules per-file analysis across a
//! bounded worker pool, aggregates diagnostics, applies ignore patterns, and
//! produces the final sorted report.
//!
//! Grounded on the teacher's top-level driver loop in `main.rs` (discover
//! inputs, decode, walk, collect findings), but rescoped to spec §5's
//! CPU-bound concurrency model: the teacher schedules its (network-bound)
//! audits under `tokio`; this core performs no network I/O, so file-level
//! parallelism is expressed with `rayon` instead (see DESIGN.md).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use regex::Regex;

use crate::cache::Caches;
use crate::config::Config;
use crate::decode::decode;
use crate::position::Diagnostic;
use crate::project::{Project, ProjectRegistry};
use crate::rules;
use crate::walker::{self, RuleCtx};

/// One file's outcome: its diagnostics, or a fatal error if a rule aborted
/// its traversal (spec §4.13).
#[derive(Debug)]
pub enum FileOutcome {
    Diagnostics(Vec<Diagnostic>),
    Fatal { filepath: String, message: String },
}

/// A run's aggregated result.
#[derive(Debug, Default)]
pub struct RunResult {
    pub diagnostics: Vec<Diagnostic>,
    pub fatal: Vec<(String, String)>,
}

impl RunResult {
    pub fn has_findings(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn has_fatal(&self) -> bool {
        !self.fatal.is_empty()
    }
}

/// Runs the full pipeline (decode → walk → collect) over `files`, bounded by
/// `num_cpus::get()` concurrent workers (spec §5), and returns the
/// aggregated, ignore-filtered, sorted result.
///
/// `ignore_patterns` drops any diagnostic whose `message` matches at least
/// one of them (spec §4.12).
pub fn run(files: &[PathBuf], config_override: Option<&Config>, ignore_patterns: &[Regex]) -> RunResult {
    let registry = Arc::new(ProjectRegistry::new());
    let caches_by_root: Arc<parking_lot::RwLock<std::collections::HashMap<PathBuf, Arc<Caches>>>> =
        Arc::new(parking_lot::RwLock::new(std::collections::HashMap::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build()
        .expect("failed to build analysis thread pool");

    let outcomes: Vec<FileOutcome> = pool.install(|| {
        files
            .par_iter()
            .map(|path| analyze_one(path, &registry, &caches_by_root, config_override))
            .collect()
    });

    let mut result = RunResult::default();
    for outcome in outcomes {
        match outcome {
            FileOutcome::Diagnostics(diags) => result.diagnostics.extend(diags),
            FileOutcome::Fatal { filepath, message } => result.fatal.push((filepath, message)),
        }
    }

    result.diagnostics.retain(|d| !ignore_patterns.iter().any(|re| re.is_match(&d.message)));
    result.diagnostics.sort();
    result
}

#[tracing::instrument(skip(registry, caches_by_root, config_override), fields(filepath = %path.display()))]
fn analyze_one(
    path: &Path,
    registry: &ProjectRegistry,
    caches_by_root: &parking_lot::RwLock<std::collections::HashMap<PathBuf, Arc<Caches>>>,
    config_override: Option<&Config>,
) -> FileOutcome {
    let filepath = path.to_string_lossy().into_owned();

    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read workflow file");
            return FileOutcome::Diagnostics(vec![Diagnostic::at_start(
                &filepath,
                "syntax",
                format!("failed to read file: {e}"),
            )]);
        }
    };

    let project = registry.resolve(path);
    let caches = project_caches(project.as_deref(), caches_by_root);

    let default_config = Config::default();
    let config = config_override
        .or_else(|| project.as_ref().map(|p| p.config()))
        .unwrap_or(&default_config);

    let (workflow, mut diagnostics) = decode(&filepath, &text);

    // Eager half of spec §4.10's reusable-workflow cache: a workflow that
    // declares `on.workflow_call` self-registers its shape so a sibling
    // file's `uses: ./this-file.yml` hits the cache instead of re-reading
    // and re-parsing this same file from disk.
    if let Some(project) = project.as_deref() {
        if workflow.on.iter().any(|e| matches!(e, crate::tree::Event::WorkflowCall(_))) {
            if let Some(key) = crate::cache::self_key(project, path) {
                if !caches.workflows.is_cached(&key) {
                    if let Ok(doc) = serde_yaml::from_str::<sisaku_models::workflow::ReusableWorkflowDocument>(&text)
                    {
                        if let Some(call) = doc.workflow_call() {
                            caches.workflows.register(key, call.clone());
                        }
                    }
                }
            }
        }
    }

    let ctx = RuleCtx { filepath: &filepath, project: project.as_deref(), config, caches: &caches };
    let mut active_rules = rules::all_rules();

    match walker::walk(&ctx, &workflow, &mut active_rules) {
        Ok(rule_diags) => {
            diagnostics.extend(rule_diags);
            FileOutcome::Diagnostics(diagnostics)
        }
        Err(err) => {
            tracing::error!(rule = err.rule, error = %err.source, "rule aborted file traversal");
            FileOutcome::Fatal { filepath, message: err.to_string() }
        }
    }
}

/// Resolves (creating on first use) the per-project metadata caches, shared
/// by every file belonging to the same project (spec §4.10/§4.12).
fn project_caches(
    project: Option<&Project>,
    caches_by_root: &parking_lot::RwLock<std::collections::HashMap<PathBuf, Arc<Caches>>>,
) -> Arc<Caches> {
    let Some(project) = project else {
        // No enclosing project: this file gets its own, unshared caches.
        return Arc::new(Caches::new());
    };
    let root = project.root_dir().to_path_buf();
    if let Some(existing) = caches_by_root.read().get(&root) {
        return existing.clone();
    }
    let caches = Arc::new(Caches::new());
    caches_by_root.write().entry(root).or_insert_with(|| caches.clone()).clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_repo(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let root = std::env::temp_dir().join(format!("sisakulint-orchestrator-test-{name}-{nanos}"));
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join(".github/workflows")).unwrap();
        root
    }

    #[test]
    fn test_run_aggregates_and_sorts_across_files() {
        let root = scratch_repo("aggregate");
        let a = root.join(".github/workflows/a.yml");
        let b = root.join(".github/workflows/b.yml");
        std::fs::write(&a, "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    permissions: write-all\n    steps: []\n").unwrap();
        std::fs::write(&b, "on: push\njobs:\n  test:\n    runs-on: ubuntu-latest\n    steps:\n      - run: echo ${{ github.event.issue.title }}\n").unwrap();

        let result = run(&[a.clone(), b.clone()], None, &[]);
        assert!(result.has_findings());
        assert!(!result.has_fatal());
        let files: Vec<_> = result.diagnostics.iter().map(|d| d.filepath.clone()).collect();
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_run_applies_ignore_patterns() {
        let root = scratch_repo("ignore");
        let file = root.join(".github/workflows/a.yml");
        std::fs::write(&file, "on: push\njobs:\n  build:\n    runs-on: ubuntu-latest\n    permissions: write-all\n    steps: []\n").unwrap();

        let without_ignore = run(&[file.clone()], None, &[]);
        assert!(without_ignore.has_findings());

        let pattern = Regex::new("write-all").unwrap();
        let with_ignore = run(&[file.clone()], None, &[pattern]);
        assert!(with_ignore.diagnostics.iter().all(|d| !d.message.contains("write-all")));

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_run_missing_file_yields_syntax_diagnostic() {
        let missing = PathBuf::from("/no/such/workflow.yml");
        let result = run(&[missing.clone()], None, &[]);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].rule_kind, "syntax");
    }
}
