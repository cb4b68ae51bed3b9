//! Project resolution (spec §4.11): discovers the enclosing repository root
//! from a file path, and loads its configuration.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::config::Config;

/// The repository a workflow file belongs to: a directory containing both
/// `.git` and `.github/workflows`.
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Walks `file`'s parents looking for a directory that contains both
    /// `.git` and `.github/workflows`. Returns `None` if none is found
    /// (e.g. an orphan file with no enclosing repository).
    pub fn discover(file: &Path) -> Option<Project> {
        let start = if file.is_dir() { file } else { file.parent()? };
        let mut dir = Some(start);
        while let Some(d) = dir {
            if d.join(".git").exists() && d.join(".github").join("workflows").is_dir() {
                let config = Config::load(d);
                return Some(Project { root: d.to_path_buf(), config });
            }
            dir = d.parent();
        }
        None
    }

    pub fn root_dir(&self) -> &Path {
        &self.root
    }

    pub fn workflow_dir(&self) -> PathBuf {
        self.root.join(".github").join("workflows")
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether `path` lies within this project's workflow directory.
    pub fn is_known(&self, path: &Path) -> bool {
        path.starts_with(self.workflow_dir())
    }
}

/// Memoizes discovered projects by root directory, so that files under the
/// same repository share one [`Project`] (and therefore one [`Config`])
/// across a run (spec §4.11: "the orchestrator memoizes discovered
/// projects").
#[derive(Default)]
pub struct ProjectRegistry {
    by_root: RwLock<HashMap<PathBuf, std::sync::Arc<Project>>>,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the project owning `file`, reusing a prior discovery for the
    /// same root if one has already happened in this run.
    pub fn resolve(&self, file: &Path) -> Option<std::sync::Arc<Project>> {
        let project = Project::discover(file)?;
        let root = project.root_dir().to_path_buf();
        if let Some(existing) = self.by_root.read().get(&root) {
            return Some(existing.clone());
        }
        let arc = std::sync::Arc::new(project);
        self.by_root.write().insert(root, arc.clone());
        Some(arc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_repo(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let root = std::env::temp_dir().join(format!("sisakulint-project-test-{name}-{nanos}"));
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join(".github/workflows")).unwrap();
        root
    }

    #[test]
    fn test_discover_finds_root_from_nested_file() {
        let root = scratch_repo("nested");
        let file = root.join(".github/workflows/ci.yml");
        std::fs::write(&file, "on: push\njobs: {}\n").unwrap();
        let project = Project::discover(&file).unwrap();
        assert_eq!(project.root_dir(), root.as_path());
        assert!(project.is_known(&file));
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_discover_returns_none_without_github_workflows_dir() {
        let root = scratch_repo("no-workflows-dir");
        std::fs::remove_dir_all(root.join(".github")).unwrap();
        let file = root.join("ci.yml");
        std::fs::write(&file, "on: push\njobs: {}\n").unwrap();
        assert!(Project::discover(&file).is_none());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_registry_memoizes_by_root() {
        let root = scratch_repo("memo");
        let file = root.join(".github/workflows/ci.yml");
        std::fs::write(&file, "on: push\njobs: {}\n").unwrap();
        let registry = ProjectRegistry::new();
        let a = registry.resolve(&file).unwrap();
        let b = registry.resolve(&file).unwrap();
        assert!(std::sync::Arc::ptr_eq(&a, &b));
        std::fs::remove_dir_all(&root).ok();
    }
}
