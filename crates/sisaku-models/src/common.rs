//! Shared models used across workflow sub-schemas.

use std::fmt::{self, Display};

use indexmap::IndexMap;
use self_cell::self_cell;
use serde::{Deserialize, Deserializer};

pub mod expr;

/// `permissions:` for a workflow or job.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", untagged)]
pub enum Permissions {
    Base(BasePermission),
    /// Fine-grained permissions, modeled as an open-ended mapping rather
    /// than a fixed struct so that unknown/new scopes round-trip and
    /// iteration over all declared scopes is straightforward.
    Explicit(IndexMap<String, Permission>),
}

impl Default for Permissions {
    fn default() -> Self {
        Self::Base(BasePermission::Default)
    }
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BasePermission {
    #[default]
    Default,
    ReadAll,
    WriteAll,
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    Read,
    Write,
    #[default]
    None,
}

/// The fixed set of permission scope names GitHub Actions recognizes.
pub const PERMISSION_SCOPES: &[&str] = &[
    "actions",
    "attestations",
    "checks",
    "contents",
    "deployments",
    "discussions",
    "id-token",
    "issues",
    "models",
    "packages",
    "pages",
    "pull-requests",
    "repository-projects",
    "security-events",
    "statuses",
];

/// An environment mapping (`env:`).
pub type Env = IndexMap<String, EnvValue>;

/// Environment variable values are always strings at runtime, but the YAML
/// may declare them as other scalar kinds before stringification.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum EnvValue {
    #[serde(deserialize_with = "null_to_default")]
    String(String),
    Number(f64),
    Boolean(bool),
}

impl Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

fn null_to_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    let val = Option::<T>::deserialize(de)?;
    Ok(val.unwrap_or_default())
}

/// An `if:` condition, which may be a literal boolean or a bare/curly
/// expression string.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum If {
    Bool(bool),
    Expr(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("malformed `uses` ref: {0}")]
pub struct UsesError(String);

#[derive(Debug, Clone, PartialEq)]
pub enum Uses {
    Local(LocalUses),
    Repository(RepositoryUses),
    Docker(DockerUses),
}

impl Uses {
    pub fn parse(uses: impl Into<String>) -> Result<Self, UsesError> {
        let uses = uses.into();
        if uses.starts_with("./") {
            Ok(Self::Local(LocalUses::new(uses)))
        } else if let Some(image) = uses.strip_prefix("docker://") {
            DockerUses::parse(image).map(Self::Docker)
        } else {
            RepositoryUses::parse(uses).map(Self::Repository)
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            Uses::Local(local) => &local.path,
            Uses::Repository(repo) => repo.raw(),
            Uses::Docker(docker) => docker.raw(),
        }
    }
}

/// A `uses: ./some/path` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalUses {
    pub path: String,
}

impl LocalUses {
    fn new(path: String) -> Self {
        Self { path }
    }
}

#[derive(Debug, PartialEq)]
struct RepositoryUsesInner<'a> {
    owner: &'a str,
    repo: &'a str,
    slug: &'a str,
    subpath: Option<&'a str>,
    git_ref: &'a str,
}

impl<'a> RepositoryUsesInner<'a> {
    fn from_str(uses: &'a str) -> Result<Self, UsesError> {
        let (path, git_ref) = uses
            .rsplit_once('@')
            .ok_or_else(|| UsesError(format!("missing `@<ref>` in {uses}")))?;

        let mut components = path.splitn(3, '/');
        let (Some(owner), Some(repo)) = (components.next(), components.next()) else {
            return Err(UsesError(format!("owner/repo slug is too short: {uses}")));
        };
        let subpath = components.next();
        let slug = if subpath.is_none() { path } else { &path[..owner.len() + 1 + repo.len()] };

        Ok(RepositoryUsesInner { owner, repo, slug, subpath, git_ref })
    }

    /// Whether `git_ref` is a fully-pinned 40-hex commit SHA.
    fn is_sha_pinned(&self) -> bool {
        self.git_ref.len() == 40 && self.git_ref.chars().all(|c| c.is_ascii_hexdigit())
    }
}

self_cell!(
    /// A `uses: some/repo@ref` clause.
    pub struct RepositoryUses {
        owner: String,

        #[covariant]
        dependent: RepositoryUsesInner,
    }

    impl {Debug, PartialEq}
);

impl Clone for RepositoryUses {
    fn clone(&self) -> Self {
        RepositoryUses::parse(self.raw().to_string()).expect("already-validated uses clause")
    }
}

impl Display for RepositoryUses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw())
    }
}

impl RepositoryUses {
    pub fn parse(uses: impl Into<String>) -> Result<Self, UsesError> {
        RepositoryUses::try_new(uses.into(), |s| RepositoryUsesInner::from_str(s))
    }

    pub fn raw(&self) -> &str {
        self.borrow_owner()
    }

    pub fn owner(&self) -> &str {
        self.borrow_dependent().owner
    }

    pub fn repo(&self) -> &str {
        self.borrow_dependent().repo
    }

    pub fn slug(&self) -> &str {
        self.borrow_dependent().slug
    }

    pub fn subpath(&self) -> Option<&str> {
        self.borrow_dependent().subpath
    }

    pub fn git_ref(&self) -> &str {
        self.borrow_dependent().git_ref
    }

    pub fn is_sha_pinned(&self) -> bool {
        self.borrow_dependent().is_sha_pinned()
    }

    /// Whether this is a first-party `actions/*` action.
    pub fn is_first_party(&self) -> bool {
        self.owner().eq_ignore_ascii_case("actions")
    }
}

#[derive(Debug, PartialEq)]
struct DockerUsesInner<'a> {
    registry: Option<&'a str>,
    image: &'a str,
    tag: Option<&'a str>,
    hash: Option<&'a str>,
}

impl<'a> DockerUsesInner<'a> {
    fn is_registry(registry: &str) -> bool {
        registry == "localhost" || registry.contains('.') || registry.contains(':')
    }

    fn from_str(uses: &'a str) -> Result<Self, UsesError> {
        let (registry, image) = match uses.split_once('/') {
            Some((registry, image)) if Self::is_registry(registry) => (Some(registry), image),
            _ => (None, uses),
        };

        if let Some(at_pos) = image.find('@') {
            let (image, hash) = image.split_at(at_pos);
            let hash = if hash.len() > 1 { Some(&hash[1..]) } else { None };
            Ok(DockerUsesInner { registry, image, tag: None, hash })
        } else {
            let (image, tag) = match image.split_once(':') {
                Some((image, "")) => (image, None),
                Some((image, tag)) => (image, Some(tag)),
                None => (image, None),
            };
            Ok(DockerUsesInner { registry, image, tag, hash: None })
        }
    }
}

self_cell!(
    /// A `uses: docker://some-image` clause.
    pub struct DockerUses {
        owner: String,

        #[covariant]
        dependent: DockerUsesInner,
    }

    impl {Debug, PartialEq}
);

impl Clone for DockerUses {
    fn clone(&self) -> Self {
        DockerUses::parse(self.raw().to_string()).expect("already-validated uses clause")
    }
}

impl DockerUses {
    pub fn parse(uses: impl Into<String>) -> Result<Self, UsesError> {
        DockerUses::try_new(uses.into(), |s| DockerUsesInner::from_str(s))
    }

    pub fn raw(&self) -> &str {
        self.borrow_owner()
    }

    pub fn registry(&self) -> Option<&str> {
        self.borrow_dependent().registry
    }

    pub fn image(&self) -> &str {
        self.borrow_dependent().image
    }

    pub fn tag(&self) -> Option<&str> {
        self.borrow_dependent().tag
    }

    pub fn hash(&self) -> Option<&str> {
        self.borrow_dependent().hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_base_and_explicit() {
        assert_eq!(
            serde_yaml::from_str::<Permissions>("read-all").unwrap(),
            Permissions::Base(BasePermission::ReadAll)
        );
        assert_eq!(
            serde_yaml::from_str::<Permissions>("contents: write").unwrap(),
            Permissions::Explicit(IndexMap::from([("contents".into(), Permission::Write)]))
        );
    }

    #[test]
    fn test_env_empty_value_is_empty_string() {
        let env = "foo:";
        assert_eq!(
            serde_yaml::from_str::<Env>(env).unwrap()["foo"],
            EnvValue::String("".into())
        );
    }

    #[test]
    fn test_uses_repository_pinned() {
        let uses =
            Uses::parse("actions/checkout@8f4b7f84864484a7bf31766abe9204da3cbe65b3").unwrap();
        let Uses::Repository(repo) = uses else { panic!() };
        assert_eq!(repo.owner(), "actions");
        assert_eq!(repo.repo(), "checkout");
        assert!(repo.is_sha_pinned());
        assert!(repo.is_first_party());
    }

    #[test]
    fn test_uses_repository_unpinned_tag() {
        let uses = Uses::parse("actions/checkout@v4").unwrap();
        let Uses::Repository(repo) = uses else { panic!() };
        assert!(!repo.is_sha_pinned());
    }

    #[test]
    fn test_uses_local() {
        let uses = Uses::parse("./.github/actions/build").unwrap();
        assert!(matches!(uses, Uses::Local(LocalUses { path }) if path == "./.github/actions/build"));
    }

    #[test]
    fn test_uses_docker() {
        let uses = Uses::parse("docker://alpine:3.8").unwrap();
        let Uses::Docker(d) = uses else { panic!() };
        assert_eq!(d.image(), "alpine");
        assert_eq!(d.tag(), Some("3.8"));
    }

    #[test]
    fn test_uses_missing_ref_is_error() {
        assert!(Uses::parse("actions/checkout").is_err());
    }
}
