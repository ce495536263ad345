//! Reference resolution: URI → cache location, local location, project ownership

use crate::reference::parser::{parse_uri, ParsedUri};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An `org/project` pair naming a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIdentity {
    pub org: String,
    pub project: String,
}

impl ProjectIdentity {
    pub fn new(org: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            project: project.into(),
        }
    }

    /// Case-insensitive comparison, matching how hosting services treat names
    pub fn matches(&self, org: &str, project: &str) -> bool {
        self.org.eq_ignore_ascii_case(org) && self.project.eq_ignore_ascii_case(project)
    }
}

/// The project the process is running inside, discovered from git metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub identity: ProjectIdentity,
    /// Directory holding `.git`
    pub root: PathBuf,
    pub remote_url: String,
}

impl ProjectContext {
    /// Walk up from `start` to the nearest `.git` directory and read the
    /// `origin` remote from its config.
    pub fn detect(start: &Path) -> Option<Self> {
        let mut current = Some(start);

        while let Some(dir) = current {
            let git_config = dir.join(".git").join("config");
            if git_config.is_file() {
                let contents = fs::read_to_string(&git_config).ok()?;
                let remote_url = origin_url(&contents)?;
                let identity = parse_remote_url(&remote_url)?;
                debug!(
                    "Detected project {}/{} at {}",
                    identity.org,
                    identity.project,
                    dir.display()
                );
                return Some(Self {
                    identity,
                    root: dir.to_path_buf(),
                    remote_url,
                });
            }
            current = dir.parent();
        }

        None
    }
}

/// Extract `url = ...` from the `[remote "origin"]` section of a git config
fn origin_url(config: &str) -> Option<String> {
    let mut in_origin = false;

    for line in config.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_origin = line == r#"[remote "origin"]"#;
            continue;
        }
        if in_origin {
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() == "url" {
                    return Some(value.trim().to_string());
                }
            }
        }
    }

    None
}

/// Parse a git remote URL into `org/project`.
///
/// Handles `git@host:org/repo.git`, `ssh://git@host/org/repo.git` and
/// `https://host/org/repo(.git)`.
pub fn parse_remote_url(url: &str) -> Option<ProjectIdentity> {
    let url = url.trim();

    let path = if let Some(rest) = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .or_else(|| url.strip_prefix("ssh://"))
        .or_else(|| url.strip_prefix("git://"))
    {
        rest.split_once('/')?.1
    } else if let Some((_, rest)) = url.split_once(':') {
        rest
    } else {
        return None;
    };

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (org, project) = path.split_once('/')?;
    let project = project.rsplit('/').next().unwrap_or(project);

    if org.is_empty() || project.is_empty() {
        return None;
    }

    Some(ProjectIdentity::new(org, project))
}

/// A resolved document reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Canonical URI, also the cache key
    pub uri: String,
    pub org: String,
    pub project: String,
    /// Sanitized path; empty for the project root
    pub path: String,
    pub is_current_project: bool,
    /// Location of the cached content under the cache root
    pub cache_path: PathBuf,
    /// Location in the working tree; set only for current-project references
    /// with a non-empty path
    pub local_path: Option<PathBuf>,
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

/// Resolver settings
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub cache_dir: PathBuf,
    /// Working tree root used for local paths when no git root is found
    pub base_dir: PathBuf,
    /// Explicit current project, taking precedence over git detection
    pub current_project: Option<ProjectIdentity>,
    /// Walk up from `base_dir` looking for a git origin
    pub detect_from_git: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".fractary/codex/cache"),
            base_dir: PathBuf::from("."),
            current_project: None,
            detect_from_git: true,
        }
    }
}

/// Per-call resolution overrides
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Force the current-project decision regardless of detection
    pub current_project: Option<bool>,
}

/// Maps URIs to [`Reference`]s
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    cache_dir: PathBuf,
    project_root: PathBuf,
    current_project: Option<ProjectIdentity>,
}

impl ReferenceResolver {
    pub fn new(config: ResolverConfig) -> Self {
        let detected = if config.current_project.is_none() && config.detect_from_git {
            ProjectContext::detect(&config.base_dir)
        } else {
            None
        };

        let project_root = detected
            .as_ref()
            .map(|ctx| ctx.root.clone())
            .unwrap_or_else(|| config.base_dir.clone());

        let current_project = config
            .current_project
            .or_else(|| detected.map(|ctx| ctx.identity));

        Self {
            cache_dir: config.cache_dir,
            project_root,
            current_project,
        }
    }

    pub fn current_project(&self) -> Option<&ProjectIdentity> {
        self.current_project.as_ref()
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Working tree root that local paths are joined onto
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Resolve a URI; `None` when it is malformed or unsafe
    pub fn resolve(&self, uri: &str) -> Option<Reference> {
        self.resolve_with(uri, &ResolveOptions::default())
    }

    pub fn resolve_with(&self, uri: &str, options: &ResolveOptions) -> Option<Reference> {
        match parse_uri(uri) {
            Ok(parsed) => Some(self.build(parsed, options)),
            Err(e) => {
                debug!("Rejected reference {}: {}", uri, e);
                None
            }
        }
    }

    fn build(&self, parsed: ParsedUri, options: &ResolveOptions) -> Reference {
        let is_current_project = options.current_project.unwrap_or_else(|| {
            self.current_project
                .as_ref()
                .is_some_and(|id| id.matches(&parsed.org, &parsed.project))
        });

        let mut cache_path = self.cache_dir.join(&parsed.org).join(&parsed.project);
        if !parsed.path.is_empty() {
            cache_path = cache_path.join(&parsed.path);
        }

        let local_path = if is_current_project && !parsed.path.is_empty() {
            Some(self.project_root.join(&parsed.path))
        } else {
            None
        };

        Reference {
            uri: parsed.to_uri(),
            org: parsed.org,
            project: parsed.project,
            path: parsed.path,
            is_current_project,
            cache_path,
            local_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver(current: Option<ProjectIdentity>) -> ReferenceResolver {
        ReferenceResolver::new(ResolverConfig {
            cache_dir: PathBuf::from("/var/cache/codex"),
            base_dir: PathBuf::from("/work/repo"),
            current_project: current,
            detect_from_git: false,
        })
    }

    #[test]
    fn test_resolve_other_project() {
        let resolver = resolver(None);
        let reference = resolver.resolve("codex://acme/handbook/docs/api.md").unwrap();

        assert_eq!(reference.uri, "codex://acme/handbook/docs/api.md");
        assert_eq!(reference.org, "acme");
        assert_eq!(reference.project, "handbook");
        assert_eq!(reference.path, "docs/api.md");
        assert!(!reference.is_current_project);
        assert_eq!(
            reference.cache_path,
            PathBuf::from("/var/cache/codex/acme/handbook/docs/api.md")
        );
        assert!(reference.local_path.is_none());
    }

    #[test]
    fn test_resolve_current_project_case_insensitive() {
        let resolver = resolver(Some(ProjectIdentity::new("Acme", "Handbook")));
        let reference = resolver.resolve("codex://acme/handbook/docs/api.md").unwrap();

        assert!(reference.is_current_project);
        assert_eq!(
            reference.local_path,
            Some(PathBuf::from("/work/repo/docs/api.md"))
        );
    }

    #[test]
    fn test_override_current_project() {
        let resolver = resolver(None);
        let options = ResolveOptions {
            current_project: Some(true),
        };
        let reference = resolver
            .resolve_with("codex://acme/handbook/a.md", &options)
            .unwrap();
        assert!(reference.is_current_project);
        assert!(reference.local_path.is_some());
    }

    #[test]
    fn test_resolve_rejects_unsafe() {
        let resolver = resolver(None);
        assert!(resolver.resolve("codex:///etc/passwd").is_none());
        assert!(resolver.resolve("codex://acme/handbook/../../x").is_none());
        assert!(resolver.resolve("not-a-uri").is_none());
    }

    #[test]
    fn test_root_reference_cache_path() {
        let resolver = resolver(None);
        let reference = resolver.resolve("codex://acme/handbook").unwrap();
        assert_eq!(reference.path, "");
        assert_eq!(
            reference.cache_path,
            PathBuf::from("/var/cache/codex/acme/handbook")
        );

        let current = ReferenceResolver::new(ResolverConfig {
            cache_dir: PathBuf::from("/var/cache/codex"),
            base_dir: PathBuf::from("/work/repo"),
            current_project: Some(ProjectIdentity::new("acme", "handbook")),
            detect_from_git: false,
        });
        let root = current.resolve("codex://acme/handbook").unwrap();
        assert!(root.is_current_project);
        assert!(root.local_path.is_none());
    }

    #[test]
    fn test_parse_remote_url_forms() {
        let expected = ProjectIdentity::new("acme", "handbook");
        assert_eq!(
            parse_remote_url("git@github.com:acme/handbook.git"),
            Some(expected.clone())
        );
        assert_eq!(
            parse_remote_url("ssh://git@github.com/acme/handbook.git"),
            Some(expected.clone())
        );
        assert_eq!(
            parse_remote_url("https://github.com/acme/handbook"),
            Some(expected.clone())
        );
        assert_eq!(
            parse_remote_url("https://github.com/acme/handbook.git/"),
            Some(expected)
        );
        assert_eq!(parse_remote_url("not a url"), None);
    }

    #[test]
    fn test_detect_from_git_config() {
        let temp = TempDir::new().unwrap();
        let git_dir = temp.path().join(".git");
        fs::create_dir_all(&git_dir).unwrap();
        fs::write(
            git_dir.join("config"),
            "[core]\n\tbare = false\n[remote \"origin\"]\n\turl = git@github.com:acme/handbook.git\n\tfetch = +refs/heads/*:refs/remotes/origin/*\n",
        )
        .unwrap();
        let nested = temp.path().join("docs").join("guides");
        fs::create_dir_all(&nested).unwrap();

        let context = ProjectContext::detect(&nested).unwrap();
        assert_eq!(context.identity, ProjectIdentity::new("acme", "handbook"));
        assert_eq!(context.root, temp.path());

        let resolver = ReferenceResolver::new(ResolverConfig {
            cache_dir: temp.path().join("cache"),
            base_dir: nested,
            current_project: None,
            detect_from_git: true,
        });
        let reference = resolver.resolve("codex://acme/handbook/README.md").unwrap();
        assert!(reference.is_current_project);
        assert_eq!(reference.local_path, Some(temp.path().join("README.md")));
    }
}
