//! `codex://` references
//!
//! Parsing, path safety and resolution of document URIs to cache and
//! working-tree locations.

mod parser;
mod resolver;
mod validator;

pub use parser::{
    build_uri, is_valid_org, is_valid_project, is_valid_uri, parse_uri, ParsedUri,
    MAX_ORG_LENGTH, MAX_PROJECT_LENGTH, URI_SCHEME,
};
pub use resolver::{
    parse_remote_url, ProjectContext, ProjectIdentity, Reference, ReferenceResolver,
    ResolveOptions, ResolverConfig,
};
pub use validator::{is_safe_path, sanitize_path, validate_path, MAX_SEGMENT_LENGTH};
