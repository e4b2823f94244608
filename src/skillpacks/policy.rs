//! Resource path admission.
//!
//! Every check runs against the live filesystem; nothing is cached between
//! load time and read time.

use super::error::SkillError;
use super::parser::normalize_resource_path;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Extensions hosts commonly restrict resources to.
pub const DEFAULT_RESOURCE_EXTENSIONS: &[&str] = &["md", "json", "yaml", "yml", "csv", "xml", "txt"];

/// Optional allow-lists for resource paths. An unset list admits everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub prefixes: Option<Vec<String>>,
}

impl ResourcePolicy {
    /// Policy with no restrictions beyond containment.
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Restrict to [`DEFAULT_RESOURCE_EXTENSIONS`].
    pub fn with_default_extensions() -> Self {
        Self {
            extensions: Some(
                DEFAULT_RESOURCE_EXTENSIONS
                    .iter()
                    .map(|e| e.to_string())
                    .collect(),
            ),
            prefixes: None,
        }
    }

    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    pub fn prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes = Some(prefixes.into_iter().map(Into::into).collect());
        self
    }

    /// Decide whether `requested` (relative to `root`) may be read.
    ///
    /// Returns the canonical path of the admitted regular file.
    pub fn admit(&self, root: &Path, requested: &str) -> Result<PathBuf, SkillError> {
        let rel = lexical_relative(requested)?;
        self.check_extension(requested, &rel)?;
        self.check_prefix(requested, &rel)?;
        resolve_within(root, Path::new(&rel), requested)
    }

    fn check_extension(&self, requested: &str, rel: &str) -> Result<(), SkillError> {
        let Some(allowed) = &self.extensions else {
            return Ok(());
        };
        let extension = Path::new(rel)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let admitted = allowed
            .iter()
            .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&extension));
        if admitted && !extension.is_empty() {
            Ok(())
        } else {
            Err(SkillError::DisallowedExtension {
                path: requested.to_string(),
                extension,
            })
        }
    }

    fn check_prefix(&self, requested: &str, rel: &str) -> Result<(), SkillError> {
        let Some(prefixes) = &self.prefixes else {
            return Ok(());
        };
        let rel = rel.to_lowercase();
        let admitted = prefixes.iter().any(|prefix| {
            let prefix = normalize_resource_path(prefix)
                .trim_matches('/')
                .to_lowercase();
            prefix.is_empty() || rel == prefix || rel.starts_with(&format!("{}/", prefix))
        });
        if admitted {
            Ok(())
        } else {
            Err(SkillError::DisallowedPath {
                path: requested.to_string(),
            })
        }
    }
}

/// Resolve `.` and `..` lexically. Absolute paths and any `..` that would
/// climb above the root are traversal attempts.
pub fn lexical_relative(requested: &str) -> Result<String, SkillError> {
    let traversal = || SkillError::PathTraversal {
        path: requested.to_string(),
    };
    let normalized = normalize_resource_path(requested);
    let path = Path::new(&normalized);
    if normalized.starts_with('/') || path.has_root() || path.is_absolute() {
        return Err(traversal());
    }

    let mut segments: Vec<&str> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(seg) => {
                let seg = seg.to_str().ok_or_else(traversal)?;
                if seg.contains(':') {
                    // drive-relative or stream syntax on Windows
                    return Err(traversal());
                }
                segments.push(seg);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if segments.pop().is_none() {
                    return Err(traversal());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }

    if segments.is_empty() {
        return Err(SkillError::ResourceNotFound {
            path: requested.to_string(),
        });
    }
    Ok(segments.join("/"))
}

/// Canonicalize `root/rel` and require it to be a regular file inside the
/// canonical root. `rel` must already be lexically contained, so any escape
/// found here came through a symbolic link.
pub(crate) fn resolve_within(
    root: &Path,
    rel: &Path,
    requested: &str,
) -> Result<PathBuf, SkillError> {
    let not_found = || SkillError::ResourceNotFound {
        path: requested.to_string(),
    };

    let canonical_root = fs::canonicalize(root).map_err(|e| SkillError::io(root, e))?;
    let candidate = canonical_root.join(rel);
    let resolved = match fs::canonicalize(&candidate) {
        Ok(path) => path,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(SkillError::io(candidate, e)),
    };

    if !resolved.starts_with(&canonical_root) {
        warn!(
            root = %canonical_root.display(),
            requested = %requested,
            target = %resolved.display(),
            "rejected symlink escaping package root"
        );
        return Err(SkillError::SymlinkEscape {
            path: requested.to_string(),
            target: resolved,
        });
    }

    let meta = fs::metadata(&resolved).map_err(|e| SkillError::io(&resolved, e))?;
    if !meta.is_file() {
        return Err(not_found());
    }
    Ok(resolved)
}
