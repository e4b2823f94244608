use crate::skillpacks::policy::ResourcePolicy;
use crate::skillpacks::scripts::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_MS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory holding config files and the default skills root, both under
/// the home directory and the project directory.
pub const CONFIG_DIR: &str = ".skillpacks";

/// Configuration for script execution
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ScriptsConfig {
    /// Wall-clock limit; zero or negative disables it
    #[serde(default)]
    pub timeout_ms: Option<i64>,
    #[serde(default)]
    pub max_output_bytes: Option<usize>,
    /// Extension (or `*`) to interpreter command line
    #[serde(default)]
    pub interpreters: BTreeMap<String, String>,
}

impl ScriptsConfig {
    pub fn timeout_ms(&self) -> i64 {
        self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)
    }

    pub fn max_output_bytes(&self) -> usize {
        self.max_output_bytes.unwrap_or(DEFAULT_MAX_OUTPUT_BYTES)
    }
}

/// The `[skills]` section
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SkillsConfig {
    /// Search roots in priority order (later wins); unset means the defaults
    #[serde(default)]
    pub roots: Option<Vec<PathBuf>>,
    #[serde(default)]
    pub resources: ResourcePolicy,
    #[serde(default)]
    pub scripts: ScriptsConfig,
}

impl SkillsConfig {
    /// Config with explicit roots and everything else default.
    pub fn with_roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: Some(roots.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Effective roots, with a leading `~` expanded.
    pub fn roots(&self) -> Vec<PathBuf> {
        match &self.roots {
            Some(roots) => roots.iter().map(|r| expand_home(r)).collect(),
            None => default_roots(),
        }
    }
}

/// User-level root first, then project-level, so the project wins on
/// duplicate names.
pub fn default_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(CONFIG_DIR).join("skills"));
    }
    roots.push(Path::new(CONFIG_DIR).join("skills"));
    roots
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub skills: SkillsConfig,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.skillpacks/config.local.toml) > project (.skillpacks/config.toml) > user (~/.skillpacks/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Try user-level config first
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(CONFIG_DIR).join("config.toml");
            if user_config.exists() {
                config.merge(Self::load_from(&user_config)?);
            }
        }

        // Project-level overrides user-level
        let project_config = Path::new(CONFIG_DIR).join("config.toml");
        if project_config.exists() {
            config.merge(Self::load_from(&project_config)?);
        }

        // Local overrides project-level, should be gitignored
        let local_config = Path::new(CONFIG_DIR).join("config.local.toml");
        if local_config.exists() {
            config.merge(Self::load_from(&local_config)?);
        }

        Ok(config)
    }

    /// Layered load, then `explicit` (if any) merged on top.
    pub fn load_with(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::load()?;
        if let Some(path) = explicit {
            config.merge(Self::load_from(path)?);
        }
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Merge another config into this one (other takes priority)
    /// Scalars and lists are overridden if set; interpreter entries are merged per key
    pub fn merge(&mut self, other: Config) {
        let skills = &mut self.skills;
        let other = other.skills;

        if other.roots.is_some() {
            skills.roots = other.roots;
        }

        if other.resources.extensions.is_some() {
            skills.resources.extensions = other.resources.extensions;
        }
        if other.resources.prefixes.is_some() {
            skills.resources.prefixes = other.resources.prefixes;
        }

        if other.scripts.timeout_ms.is_some() {
            skills.scripts.timeout_ms = other.scripts.timeout_ms;
        }
        if other.scripts.max_output_bytes.is_some() {
            skills.scripts.max_output_bytes = other.scripts.max_output_bytes;
        }
        skills.scripts.interpreters.extend(other.scripts.interpreters);
    }
}
