//! `codex://<org>/<project>[/<path>]` URI grammar

use crate::error::{CodexError, Result};
use crate::reference::validator::{sanitize_path, validate_path};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// URI scheme prefix for document references
pub const URI_SCHEME: &str = "codex://";

/// Maximum organization name length
pub const MAX_ORG_LENGTH: usize = 39;

/// Maximum project name length
pub const MAX_PROJECT_LENGTH: usize = 100;

static ORG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]*[A-Za-z0-9]?$").expect("Invalid org regex")
});

static PROJECT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("Invalid project regex"));

/// Syntactic parts of a `codex://` URI after validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedUri {
    pub org: String,
    pub project: String,
    /// Sanitized document path, empty for the project root
    pub path: String,
}

impl ParsedUri {
    /// Canonical URI string, used as the cache key
    pub fn to_uri(&self) -> String {
        build_uri(&self.org, &self.project, &self.path)
    }
}

/// Assemble a canonical URI from its parts
pub fn build_uri(org: &str, project: &str, path: &str) -> String {
    if path.is_empty() {
        format!("{}{}/{}", URI_SCHEME, org, project)
    } else {
        format!("{}{}/{}/{}", URI_SCHEME, org, project, path)
    }
}

/// Check an organization name against the org grammar
pub fn is_valid_org(org: &str) -> bool {
    !org.is_empty() && org.len() <= MAX_ORG_LENGTH && ORG_PATTERN.is_match(org)
}

/// Check a project name against the project grammar
pub fn is_valid_project(project: &str) -> bool {
    !project.is_empty()
        && project.len() <= MAX_PROJECT_LENGTH
        && !project.contains("..")
        && !project.chars().all(|c| c == '.')
        && PROJECT_PATTERN.is_match(project)
}

/// Parse and validate a `codex://` URI.
///
/// The path part is rejected when unsafe and sanitized otherwise, so the
/// returned parts can be joined under a root directory without escaping it.
pub fn parse_uri(uri: &str) -> Result<ParsedUri> {
    let rest = uri
        .trim()
        .strip_prefix(URI_SCHEME)
        .ok_or_else(|| CodexError::InvalidReference(format!("missing codex:// scheme: {}", uri)))?;

    let mut parts = rest.splitn(3, '/');
    let org = parts.next().unwrap_or_default();
    let project = parts.next().unwrap_or_default();
    let raw_path = parts.next().unwrap_or_default();

    if !is_valid_org(org) {
        return Err(CodexError::InvalidReference(format!(
            "invalid organization '{}' in {}",
            org, uri
        )));
    }

    if !is_valid_project(project) {
        return Err(CodexError::InvalidReference(format!(
            "invalid project '{}' in {}",
            project, uri
        )));
    }

    validate_path(raw_path)?;

    Ok(ParsedUri {
        org: org.to_string(),
        project: project.to_string(),
        path: sanitize_path(raw_path),
    })
}

/// Whether a string is a well-formed, safe `codex://` URI
pub fn is_valid_uri(uri: &str) -> bool {
    parse_uri(uri).is_ok()
}
