//! Process-lifetime owner of the current catalog.

use super::error::SkillError;
use super::index::{Catalog, PackageSummary};
use super::inline::InlineSkill;
use super::resources;
use super::scripts::{timeout_from_millis, InterpreterTable, ScriptOutput, ScriptRunner};
use crate::config::SkillsConfig;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Holds the loaded [`Catalog`] and swaps it wholesale on reload.
///
/// Callers take an `Arc<Catalog>` snapshot; a reload never mutates a catalog
/// someone else is reading.
#[derive(Debug)]
pub struct SkillRegistry {
    config: SkillsConfig,
    runner: ScriptRunner,
    inline: Vec<InlineSkill>,
    current: RwLock<Arc<Catalog>>,
}

impl SkillRegistry {
    /// Build the script runner from `config` and run the first load pass.
    pub fn new(config: SkillsConfig) -> Result<Self, SkillError> {
        Self::with_inline(config, Vec::new())
    }

    /// Like [`SkillRegistry::new`], with packs defined in code. They are
    /// re-validated and merged on every reload.
    pub fn with_inline(config: SkillsConfig, inline: Vec<InlineSkill>) -> Result<Self, SkillError> {
        let interpreters = InterpreterTable::with_overrides(&config.scripts.interpreters)?;
        let runner =
            ScriptRunner::new(interpreters).with_max_output_bytes(config.scripts.max_output_bytes());
        let catalog = Self::load_catalog(&config, &inline);
        Ok(Self {
            config,
            runner,
            inline,
            current: RwLock::new(Arc::new(catalog)),
        })
    }

    fn load_catalog(config: &SkillsConfig, inline: &[InlineSkill]) -> Catalog {
        let roots = config.roots();
        Catalog::load_with_inline(roots.as_slice(), config.resources.clone(), inline)
    }

    /// Rebuild the catalog from the configured roots and make it current.
    pub fn reload(&self) -> Arc<Catalog> {
        let catalog = Arc::new(Self::load_catalog(&self.config, &self.inline));
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Arc::clone(&catalog);
        info!(packages = catalog.count(), "skill catalog reloaded");
        catalog
    }

    /// Snapshot of the current catalog.
    pub fn catalog(&self) -> Arc<Catalog> {
        let current = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&current)
    }

    pub fn config(&self) -> &SkillsConfig {
        &self.config
    }

    pub fn runner(&self) -> &ScriptRunner {
        &self.runner
    }

    pub fn list_packages(&self) -> Vec<PackageSummary> {
        self.catalog().list()
    }

    /// Instruction body of a package, what a host injects on activation.
    pub fn instructions(&self, name: &str) -> Result<String, SkillError> {
        self.catalog()
            .get(name)
            .map(|p| p.body.clone())
            .ok_or_else(|| SkillError::PackageNotFound {
                name: name.to_string(),
            })
    }

    pub async fn read_resource(&self, package: &str, resource: &str) -> Result<String, SkillError> {
        let catalog = self.catalog();
        resources::read_resource(&catalog, package, resource).await
    }

    /// Run a script with the configured timeout.
    pub async fn run_script(
        &self,
        package: &str,
        script: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<ScriptOutput, SkillError> {
        self.run_script_with_timeout(package, script, args, self.config.scripts.timeout_ms(), cancel)
            .await
    }

    /// Run a script with an explicit timeout; zero or negative disables it.
    pub async fn run_script_with_timeout(
        &self,
        package: &str,
        script: &str,
        args: &[String],
        timeout_ms: i64,
        cancel: &CancellationToken,
    ) -> Result<ScriptOutput, SkillError> {
        let catalog = self.catalog();
        self.runner
            .run_in(&catalog, package, script, args, timeout_from_millis(timeout_ms), cancel)
            .await
    }
}
