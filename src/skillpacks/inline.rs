//! Skill packs defined in code instead of on disk.
//!
//! An inline pack carries its instructions and resources in memory. It goes
//! through the same field rules as a `SKILL.md` manifest and joins the
//! catalog after the file packs, which win on a name clash.

use super::error::{ManifestError, SkillError};
use super::index::Package;
use super::parser::{normalize_resource_path, validate_fields};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Produces resource content on demand.
pub type ResourceFn = Arc<dyn Fn() -> Result<String, String> + Send + Sync>;

#[derive(Clone)]
pub enum ResourceContent {
    Static(String),
    Computed(ResourceFn),
}

impl fmt::Debug for ResourceContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceContent::Static(text) => f.debug_tuple("Static").field(&text.len()).finish(),
            ResourceContent::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl PartialEq for ResourceContent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ResourceContent::Static(a), ResourceContent::Static(b)) => a == b,
            (ResourceContent::Computed(a), ResourceContent::Computed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for ResourceContent {}

/// A named resource of an inline pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineResource {
    pub name: String,
    pub description: Option<String>,
    pub content: ResourceContent,
}

impl InlineResource {
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            content: ResourceContent::Static(content.into()),
        }
    }

    /// Resource whose content is produced by `f` on every read.
    pub fn computed<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            content: ResourceContent::Computed(Arc::new(f)),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn read(&self) -> Result<String, String> {
        match &self.content {
            ResourceContent::Static(text) => Ok(text.clone()),
            ResourceContent::Computed(f) => f(),
        }
    }
}

/// A skill pack built in code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineSkill {
    pub name: String,
    pub description: String,
    pub body: String,
    pub compatibility: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub resources: Vec<InlineResource>,
}

/// Label standing in for the source directory of an inline pack.
pub fn inline_origin(name: &str) -> PathBuf {
    PathBuf::from(format!("<inline:{}>", name))
}

impl InlineSkill {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            body: body.into(),
            compatibility: None,
            metadata: BTreeMap::new(),
            resources: Vec::new(),
        }
    }

    pub fn compatibility(mut self, compatibility: impl Into<String>) -> Self {
        self.compatibility = Some(compatibility.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn resource(mut self, resource: InlineResource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Validate and convert into a catalog package.
    ///
    /// Resource names are normalized like link targets and must be unique
    /// case-insensitively.
    pub fn into_package(self) -> Result<Package, SkillError> {
        let origin = inline_origin(&self.name);
        validate_fields(&self.name, &self.description, self.compatibility.as_deref())
            .map_err(|e| SkillError::from_manifest(&origin, e))?;
        if self.body.trim().is_empty() {
            return Err(SkillError::from_manifest(&origin, ManifestError::EmptyBody));
        }

        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut inline = BTreeMap::new();
        for resource in self.resources {
            let key = normalize_resource_path(&resource.name);
            if key.is_empty() {
                return Err(SkillError::InvalidArgument(format!(
                    "package '{}': resource name cannot be empty",
                    self.name
                )));
            }
            if !seen.insert(key.to_lowercase()) {
                return Err(SkillError::InvalidArgument(format!(
                    "package '{}': duplicate resource '{}'",
                    self.name, key
                )));
            }
            names.push(key.clone());
            inline.insert(key, resource);
        }

        Ok(Package {
            name: self.name,
            description: self.description,
            body: self.body,
            compatibility: self.compatibility,
            metadata: self.metadata,
            resources: names,
            scripts: BTreeMap::new(),
            source_path: origin,
            inline_resources: Some(inline),
        })
    }
}
