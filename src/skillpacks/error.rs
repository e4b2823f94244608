//! Error types for skill pack loading, resource access and script execution.

use std::path::PathBuf;
use thiserror::Error;

/// Failures produced by the manifest grammar. Carries no path; the loader
/// attaches the manifest location when it converts into [`SkillError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("missing '---' delimited metadata block")]
    MissingDelimiters,
    #[error("manifest body is empty")]
    EmptyBody,
    #[error("required field '{field}' is missing")]
    MissingField { field: &'static str },
    #[error("field '{field}' is invalid: {reason}")]
    InvalidFieldValue { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum SkillError {
    #[error("malformed manifest {}: {reason}", .path.display())]
    MalformedManifest { path: PathBuf, reason: String },

    #[error("manifest {}: required field '{field}' is missing", .path.display())]
    MissingField { path: PathBuf, field: &'static str },

    #[error("manifest {}: field '{field}' is invalid: {reason}", .path.display())]
    InvalidFieldValue {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },

    #[error("resource '{path}' has disallowed extension '{extension}'")]
    DisallowedExtension { path: String, extension: String },

    #[error("resource '{path}' is outside the allowed path prefixes")]
    DisallowedPath { path: String },

    #[error("resource '{path}' resolves outside the package root")]
    PathTraversal { path: String },

    #[error("resource '{path}' is a symlink escaping the package root (target {})", .target.display())]
    SymlinkEscape { path: String, target: PathBuf },

    #[error("resource '{path}' not found")]
    ResourceNotFound { path: String },

    #[error("resource '{resource}' is not declared by package '{package}'")]
    ResourceNotDeclared { package: String, resource: String },

    #[error("resource '{resource}' of package '{package}' failed: {reason}")]
    InlineResourceFailed {
        package: String,
        resource: String,
        reason: String,
    },

    #[error("package '{name}' not found")]
    PackageNotFound { name: String },

    #[error("script '{script}' not found in package '{package}'")]
    ScriptNotFound { package: String, script: String },

    #[error("script '{script}' in package '{package}' timed out after {timeout_ms}ms")]
    ScriptTimeout {
        package: String,
        script: String,
        timeout_ms: u64,
    },

    #[error("script '{script}' in package '{package}' failed ({}): {stderr}", exit_label(.exit_code))]
    ScriptFailed {
        package: String,
        script: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("script '{script}' in package '{package}' was cancelled")]
    ScriptCancelled { package: String, script: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl SkillError {
    /// Attach the manifest path to a grammar failure.
    pub fn from_manifest(path: impl Into<PathBuf>, err: ManifestError) -> Self {
        let path = path.into();
        match err {
            ManifestError::MissingField { field } => SkillError::MissingField { path, field },
            ManifestError::InvalidFieldValue { field, reason } => {
                SkillError::InvalidFieldValue { path, field, reason }
            }
            other @ (ManifestError::MissingDelimiters | ManifestError::EmptyBody) => {
                SkillError::MalformedManifest {
                    path,
                    reason: other.to_string(),
                }
            }
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SkillError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for rejections whose precise reason would reveal the filesystem
    /// layout.
    pub fn is_security_rejection(&self) -> bool {
        matches!(
            self,
            SkillError::PathTraversal { .. }
                | SkillError::SymlinkEscape { .. }
                | SkillError::DisallowedExtension { .. }
                | SkillError::DisallowedPath { .. }
        )
    }

    /// Message safe to show to an end user or model. Security rejections read
    /// exactly like a missing resource; everything else uses `Display`.
    pub fn public_message(&self) -> String {
        match self {
            SkillError::PathTraversal { path }
            | SkillError::SymlinkEscape { path, .. }
            | SkillError::DisallowedExtension { path, .. }
            | SkillError::DisallowedPath { path }
            | SkillError::ResourceNotFound { path } => {
                SkillError::ResourceNotFound { path: path.clone() }.to_string()
            }
            SkillError::Io { .. } => "I/O error while accessing skill pack".to_string(),
            other => other.to_string(),
        }
    }
}
