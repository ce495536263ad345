//! Path validation and sanitization for the document part of a reference

use crate::error::{CodexError, Result};

/// Maximum length of a single path segment
pub const MAX_SEGMENT_LENGTH: usize = 255;

/// Check a document path for constructs that could escape the project root.
///
/// Rejects NUL bytes, absolute paths (Unix, Windows drive, UNC), parent
/// traversal (including percent-encoded `..`), home-directory expansion,
/// embedded URI schemes and over-long segments. An empty path is valid.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }

    if path.contains('\0') {
        return Err(CodexError::InvalidReference(
            "path contains null bytes".to_string(),
        ));
    }

    if path.starts_with('/') || path.starts_with('\\') {
        return Err(CodexError::InvalidReference(format!(
            "absolute paths not allowed: {}",
            path
        )));
    }

    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(CodexError::InvalidReference(format!(
            "drive-qualified paths not allowed: {}",
            path
        )));
    }

    if path.contains("://") {
        return Err(CodexError::InvalidReference(format!(
            "embedded URI scheme not allowed: {}",
            path
        )));
    }

    for segment in path.split(['/', '\\']) {
        if segment.is_empty() {
            continue;
        }

        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        if segment == ".." || decoded == ".." {
            return Err(CodexError::InvalidReference(format!(
                "parent directory traversal not allowed: {}",
                path
            )));
        }

        if segment.starts_with('~') {
            return Err(CodexError::InvalidReference(format!(
                "home directory expansion not allowed: {}",
                path
            )));
        }

        if segment.len() > MAX_SEGMENT_LENGTH {
            return Err(CodexError::InvalidReference(format!(
                "path segment too long: {} chars (max {})",
                segment.len(),
                MAX_SEGMENT_LENGTH
            )));
        }
    }

    Ok(())
}

/// Check a path without producing an error value
pub fn is_safe_path(path: &str) -> bool {
    validate_path(path).is_ok()
}

/// Normalize a validated path: forward slashes only, no empty or `.`
/// segments, no leading or trailing slash.
pub fn sanitize_path(path: &str) -> String {
    path.trim()
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_paths() {
        assert!(validate_path("docs/api.md").is_ok());
        assert!(validate_path("").is_ok());
        assert!(validate_path("specs/v1.2/overview.md").is_ok());
        assert!(validate_path("a..b/file.md").is_ok());
    }

    #[test]
    fn test_rejects_traversal() {
        assert!(!is_safe_path("../../etc/passwd"));
        assert!(!is_safe_path("docs/../../secret"));
        assert!(!is_safe_path("docs\\..\\secret"));
        assert!(!is_safe_path("docs/%2e%2e/secret"));
        assert!(!is_safe_path("docs/%2E%2e/secret"));
    }

    #[test]
    fn test_rejects_absolute_and_home() {
        assert!(!is_safe_path("/etc/passwd"));
        assert!(!is_safe_path("\\\\server\\share"));
        assert!(!is_safe_path("C:/Windows/system.ini"));
        assert!(!is_safe_path("~/.ssh/id_rsa"));
        assert!(!is_safe_path("docs/~root/notes"));
    }

    #[test]
    fn test_rejects_nul_scheme_and_long_segments() {
        assert!(!is_safe_path("docs/a\0b.md"));
        assert!(!is_safe_path("docs/file:///etc/passwd"));
        assert!(!is_safe_path(&format!("docs/{}", "a".repeat(256))));
        assert!(is_safe_path(&format!("docs/{}", "a".repeat(255))));
    }

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("  docs//api.md  "), "docs/api.md");
        assert_eq!(sanitize_path("./docs/./guide/"), "docs/guide");
        assert_eq!(sanitize_path("docs\\win\\file.md"), "docs/win/file.md");
        assert_eq!(sanitize_path(""), "");
    }
}
