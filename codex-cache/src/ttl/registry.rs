//! Artifact types: path patterns mapped to cache TTLs

use crate::error::{CodexError, Result};
use crate::ttl::duration::{DAY, HOUR, WEEK};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A named class of documents with its own TTL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactType {
    pub name: String,

    /// Glob patterns over the document path
    pub patterns: Vec<String>,

    pub ttl_seconds: u64,

    #[serde(default)]
    pub description: String,

    /// Higher priorities are matched first
    #[serde(default)]
    pub priority: i32,
}

impl ArtifactType {
    pub fn new(name: &str, patterns: &[&str], ttl_seconds: u64, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            ttl_seconds,
            description: String::new(),
            priority,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// The types every registry starts from
pub fn builtin_types() -> Vec<ArtifactType> {
    vec![
        ArtifactType::new("docs", &["docs/**/*.md", "docs/**/*.mdx", "*.md"], DAY, 10)
            .with_description("Documentation files"),
        ArtifactType::new(
            "config",
            &["*.yaml", "*.yml", "*.json", "*.toml", ".fractary/**", "config/**"],
            HOUR,
            20,
        )
        .with_description("Configuration files"),
        ArtifactType::new(
            "schema",
            &[
                "schemas/**/*.json",
                "schemas/**/*.yaml",
                "**/*.schema.json",
                "**/*.schema.yaml",
            ],
            DAY,
            30,
        )
        .with_description("Schema definition files"),
        ArtifactType::new(
            "templates",
            &["templates/**/*", "**/*.template.*", "**/*.tmpl"],
            WEEK,
            15,
        )
        .with_description("Template files"),
        ArtifactType::new("specs", &["specs/**/*.md", "specifications/**/*.md"], DAY, 25)
            .with_description("Specification documents"),
        ArtifactType::new(
            "workflows",
            &[".github/workflows/**/*.yaml", ".github/workflows/**/*.yml"],
            6 * HOUR,
            40,
        )
        .with_description("CI/CD workflow files"),
        ArtifactType::new(
            "scripts",
            &["scripts/**/*.sh", "scripts/**/*.py", "bin/**/*"],
            12 * HOUR,
            35,
        )
        .with_description("Script files"),
        ArtifactType::new(
            "prompts",
            &["prompts/**/*.md", "prompts/**/*.txt", "**/*.prompt.md"],
            HOUR,
            50,
        )
        .with_description("AI prompt templates"),
        ArtifactType::new(
            "agents",
            &["agents/**/*", "**/*.agent.yaml", "**/*.agent.md"],
            HOUR,
            45,
        )
        .with_description("AI agent definitions"),
        ArtifactType::new(
            "skills",
            &["skills/**/*", "**/*.skill.yaml", "**/*.skill.md"],
            HOUR,
            45,
        )
        .with_description("AI skill definitions"),
    ]
}

#[derive(Debug, Clone)]
struct RegisteredType {
    artifact: ArtifactType,
    patterns: Vec<Pattern>,
}

impl RegisteredType {
    fn compile(artifact: ArtifactType) -> Result<Self> {
        let patterns = artifact
            .patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    CodexError::Config(format!(
                        "invalid pattern '{}' for type '{}': {}",
                        p, artifact.name, e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { artifact, patterns })
    }

    fn matches(&self, path: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.patterns.iter().any(|p| p.matches_with(path, options))
    }
}

/// Ordered set of artifact types used to pick a TTL from a document path
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    /// Sorted by descending priority; ties keep registration order
    types: Vec<RegisteredType>,
}

impl TypeRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in types
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for artifact in builtin_types() {
            // Built-in patterns are known to compile
            if let Ok(compiled) = RegisteredType::compile(artifact) {
                registry.insert(compiled);
            }
        }
        registry
    }

    /// Add a type, replacing any existing type with the same name
    pub fn register(&mut self, artifact: ArtifactType) -> Result<()> {
        let compiled = RegisteredType::compile(artifact)?;
        self.insert(compiled);
        Ok(())
    }

    fn insert(&mut self, compiled: RegisteredType) {
        self.types
            .retain(|t| t.artifact.name != compiled.artifact.name);
        let position = self
            .types
            .iter()
            .position(|t| t.artifact.priority < compiled.artifact.priority)
            .unwrap_or(self.types.len());
        self.types.insert(position, compiled);
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.types.len();
        self.types.retain(|t| t.artifact.name != name);
        self.types.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&ArtifactType> {
        self.types
            .iter()
            .find(|t| t.artifact.name == name)
            .map(|t| &t.artifact)
    }

    /// Types in match order
    pub fn types(&self) -> impl Iterator<Item = &ArtifactType> {
        self.types.iter().map(|t| &t.artifact)
    }

    /// Highest-priority type whose patterns match `path`
    pub fn detect(&self, path: &str) -> Option<&ArtifactType> {
        self.types
            .iter()
            .find(|t| t.matches(path))
            .map(|t| &t.artifact)
    }

    pub fn ttl_for(&self, path: &str) -> Option<Duration> {
        self.detect(path).map(ArtifactType::ttl)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
