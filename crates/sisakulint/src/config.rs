//! Project-level configuration (spec §6, §10.4).
//!
//! Grounded on the teacher's `config.rs`: a `serde_yaml`-deserialized,
//! `#[serde(default)]`-everywhere struct loaded from a well-known path,
//! falling back to an all-`None` default when the file is absent or
//! unreadable.

use std::path::Path;

use serde::Deserialize;

/// `.github/sisakulint.y{,a}ml` at the project root.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// The set of `vars.<name>` identifiers the expression checker accepts.
    /// `None` (key absent) disables `vars.*` validation entirely; `Some(vec![])`
    /// validates and rejects every reference (spec §9 Open Question (b)).
    #[serde(default)]
    pub config_variables: Option<Vec<String>>,
    #[serde(default)]
    pub self_hosted_runner: Option<SelfHostedRunnerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelfHostedRunnerConfig {
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

const CONFIG_NAMES: &[&str] = &[".github/sisakulint.yml", ".github/sisakulint.yaml"];

impl Config {
    /// Loads the config from `root`, falling back to [`Config::default`] if
    /// no config file is present or it fails to parse (a malformed config
    /// is not itself a fatal condition for the run).
    pub fn load(root: &Path) -> Self {
        for name in CONFIG_NAMES {
            let path = root.join(name);
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    return serde_yaml::from_str(&text).unwrap_or_else(|e| {
                        tracing::warn!(path = %path.display(), error = %e, "malformed config; using defaults");
                        Config::default()
                    });
                }
                Err(_) => continue,
            }
        }
        Config::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_default() {
        let dir = std::env::temp_dir().join("sisakulint-test-missing-config");
        let cfg = Config::load(&dir);
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_load_parses_config_variables() {
        let dir = tempdir();
        std::fs::create_dir_all(dir.join(".github")).unwrap();
        std::fs::write(
            dir.join(".github/sisakulint.yml"),
            "configVariables:\n  - foo\n  - bar\n",
        )
        .unwrap();
        let cfg = Config::load(&dir);
        assert_eq!(cfg.config_variables, Some(vec!["foo".to_string(), "bar".to_string()]));
        std::fs::remove_dir_all(&dir).ok();
    }

    fn tempdir() -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("sisakulint-test-{}-{nanos}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
