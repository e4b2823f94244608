//! Skill pack loading and the in-memory catalog.

use super::discovery::{discover_package_dirs, MANIFEST_FILE};
use super::error::SkillError;
use super::inline::{inline_origin, InlineResource, InlineSkill};
use super::parser::{normalize_resource_path, parse_manifest};
use super::policy::ResourcePolicy;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Subdirectory whose files are exposed as scripts.
pub const SCRIPTS_DIR: &str = "scripts";

/// A validated skill pack. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: String,
    pub description: String,
    pub body: String,
    pub compatibility: Option<String>,
    pub metadata: BTreeMap<String, String>,
    /// Relative resource paths linked from the body, in first-seen order
    pub resources: Vec<String>,
    /// Script name (file stem) to absolute path
    pub scripts: BTreeMap<String, PathBuf>,
    /// Package directory, or an `<inline:name>` label for inline packs
    pub source_path: PathBuf,
    /// In-memory resources of an inline pack, keyed by declared name
    #[serde(skip)]
    pub inline_resources: Option<BTreeMap<String, InlineResource>>,
}

impl Package {
    /// Declared resource matching `name` case-insensitively.
    pub fn resource(&self, name: &str) -> Option<&str> {
        let wanted = normalize_resource_path(name);
        self.resources
            .iter()
            .find(|r| r.eq_ignore_ascii_case(&wanted))
            .map(String::as_str)
    }

    /// Script path by name; exact match first, then case-insensitive.
    pub fn script(&self, name: &str) -> Option<(&str, &Path)> {
        self.scripts
            .get_key_value(name)
            .or_else(|| {
                self.scripts
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
            })
            .map(|(k, v)| (k.as_str(), v.as_path()))
    }

    /// True for packs defined in code rather than loaded from a directory.
    pub fn is_inline(&self) -> bool {
        self.inline_resources.is_some()
    }

    pub fn summary(&self) -> PackageSummary {
        PackageSummary {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

/// Name and description, what a host advertises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSummary {
    pub name: String,
    pub description: String,
}

/// A package directory that failed to load.
#[derive(Debug)]
pub struct LoadFailure {
    pub dir: PathBuf,
    pub error: SkillError,
}

/// A package that displaced an earlier one with the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub name: String,
    pub replaced: PathBuf,
    pub winner: PathBuf,
}

/// Outcome of one load pass.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub discovered: usize,
    pub loaded: usize,
    pub failures: Vec<LoadFailure>,
    pub replaced: Vec<Replacement>,
}

/// All successfully loaded packages, keyed by lowercase name.
#[derive(Debug, Default)]
pub struct Catalog {
    packages: HashMap<String, Package>,
    policy: ResourcePolicy,
    report: LoadReport,
}

impl Catalog {
    /// Discover and load every package under `roots`.
    ///
    /// Later directories win on duplicate names. Failures are isolated per
    /// directory and recorded in [`Catalog::report`].
    pub fn load<P: AsRef<Path>>(roots: &[P], policy: ResourcePolicy) -> Self {
        Self::load_with_inline(roots, policy, &[])
    }

    /// Like [`Catalog::load`], then add `inline` packs.
    ///
    /// An inline pack whose name is already taken by a file pack is dropped
    /// with a warning and recorded in the report's `replaced` list.
    pub fn load_with_inline<P: AsRef<Path>>(
        roots: &[P],
        policy: ResourcePolicy,
        inline: &[InlineSkill],
    ) -> Self {
        let dirs = discover_package_dirs(roots);
        info!("Discovered {} potential skill packs", dirs.len());

        let mut catalog = Catalog {
            packages: HashMap::new(),
            policy,
            report: LoadReport {
                discovered: dirs.len() + inline.len(),
                ..LoadReport::default()
            },
        };

        for dir in dirs {
            match load_package(&dir, &catalog.policy) {
                Ok(package) => catalog.insert(package),
                Err(error) => {
                    warn!(dir = %dir.display(), error = %error, "skipping skill pack");
                    catalog.report.failures.push(LoadFailure { dir, error });
                }
            }
        }

        for skill in inline {
            match skill.clone().into_package() {
                Ok(package) => catalog.insert_inline(package),
                Err(error) => {
                    let dir = inline_origin(&skill.name);
                    warn!(skill = %skill.name, error = %error, "skipping inline skill pack");
                    catalog.report.failures.push(LoadFailure { dir, error });
                }
            }
        }

        catalog.report.loaded = catalog.packages.len();
        info!(
            "Loaded {} of {} skill packs",
            catalog.report.loaded, catalog.report.discovered
        );
        catalog
    }

    fn insert(&mut self, package: Package) {
        let key = package.name.to_lowercase();
        let name = package.name.clone();
        let winner = package.source_path.clone();
        if let Some(previous) = self.packages.insert(key, package) {
            warn!(
                name = %name,
                replaced = %previous.source_path.display(),
                winner = %winner.display(),
                "duplicate skill pack name; later directory wins"
            );
            self.report.replaced.push(Replacement {
                name,
                replaced: previous.source_path,
                winner,
            });
        } else {
            debug!(name = %name, "loaded skill pack");
        }
    }

    fn insert_inline(&mut self, package: Package) {
        let key = package.name.to_lowercase();
        if let Some(existing) = self.packages.get(&key) {
            warn!(
                name = %package.name,
                kept = %existing.source_path.display(),
                "inline skill pack name already taken; keeping the existing pack"
            );
            self.report.replaced.push(Replacement {
                name: package.name,
                replaced: package.source_path,
                winner: existing.source_path.clone(),
            });
            return;
        }
        debug!(name = %package.name, "loaded inline skill pack");
        self.packages.insert(key, package);
    }

    /// Get package by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(&name.trim().to_lowercase())
    }

    /// Packages sorted by name
    pub fn packages(&self) -> Vec<&Package> {
        let mut packages: Vec<_> = self.packages.values().collect();
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        packages
    }

    /// Name and description of every package, sorted by name
    pub fn list(&self) -> Vec<PackageSummary> {
        self.packages().into_iter().map(Package::summary).collect()
    }

    /// Policy this catalog was loaded with; reads are checked against it too
    pub fn policy(&self) -> &ResourcePolicy {
        &self.policy
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Count of loaded packages
    pub fn count(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Build one package from its directory.
pub fn load_package(dir: &Path, policy: &ResourcePolicy) -> Result<Package, SkillError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let content =
        fs::read_to_string(&manifest_path).map_err(|e| SkillError::io(&manifest_path, e))?;
    let manifest =
        parse_manifest(&content).map_err(|e| SkillError::from_manifest(&manifest_path, e))?;

    let resources = manifest.resource_links();
    for resource in &resources {
        policy.admit(dir, resource)?;
    }

    let scripts = discover_scripts(dir)?;

    Ok(Package {
        name: manifest.name,
        description: manifest.description,
        body: manifest.body,
        compatibility: manifest.compatibility,
        metadata: manifest.metadata,
        resources,
        scripts,
        source_path: dir.to_path_buf(),
        inline_resources: None,
    })
}

fn discover_scripts(dir: &Path) -> Result<BTreeMap<String, PathBuf>, SkillError> {
    let scripts_dir = dir.join(SCRIPTS_DIR);
    let mut scripts = BTreeMap::new();
    if !scripts_dir.is_dir() {
        return Ok(scripts);
    }

    let mut files: Vec<PathBuf> = fs::read_dir(&scripts_dir)
        .map_err(|e| SkillError::io(&scripts_dir, e))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    for path in files {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.is_empty() || stem.starts_with('.') {
            continue;
        }
        if let Some(existing) = scripts.get(stem) {
            warn!(
                script = %stem,
                kept = %existing.display(),
                ignored = %path.display(),
                "duplicate script name"
            );
            continue;
        }
        scripts.insert(stem.to_string(), path);
    }

    Ok(scripts)
}
