//! Error types for repodocs.
//!
//! Library crates use [`RepoDocsError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// A remote URL pointed at a hosting service we cannot derive edit links for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported hosting provider '{host}' (expected github.com or bitbucket.org)")]
pub struct UnsupportedProviderError {
    pub host: String,
}

/// Top-level error type for all repodocs operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoDocsError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Glob pattern in `index_pattern` failed to compile.
    #[error("invalid index pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Edit-link derivation hit a host that is neither GitHub nor Bitbucket.
    #[error(transparent)]
    UnsupportedProvider(#[from] UnsupportedProviderError),

    /// Remote URL could not be split into host, organization and repository.
    #[error("malformed remote url '{url}'")]
    MalformedRemote { url: String },

    /// The external fragment compiler failed or produced incomplete output.
    #[error("compilation failed for '{repo}': {reason}")]
    CompilationFailure { repo: String, reason: String },

    /// Two fragments of one repository normalized to the same permalink.
    #[error("permalink '{permalink}' in '{repo}' produced by both {first} and {second}")]
    AssemblyConflict {
        repo: String,
        permalink: String,
        first: String,
        second: String,
    },

    /// Fragment or metadata parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid output, bad shard layout, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RepoDocsError>;

impl RepoDocsError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn compilation(repo: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CompilationFailure {
            repo: repo.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = RepoDocsError::config("missing url");
        assert_eq!(err.to_string(), "config error: missing url");

        let err = RepoDocsError::compilation("widgets", "exit status 2");
        assert_eq!(
            err.to_string(),
            "compilation failed for 'widgets': exit status 2"
        );
    }

    #[test]
    fn unsupported_provider_converts() {
        let err: RepoDocsError = UnsupportedProviderError {
            host: "gitlab.com".into(),
        }
        .into();
        assert!(matches!(err, RepoDocsError::UnsupportedProvider(_)));
        assert!(err.to_string().contains("gitlab.com"));
    }
}
