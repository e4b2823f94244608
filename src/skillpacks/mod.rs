//! Skill Packs: portable, repo-checkable skill packages.
//!
//! A skill pack is a directory with a `SKILL.md` manifest (a `---` delimited
//! metadata block followed by markdown instructions), optional resource files
//! linked from the instructions, and optional executables under `scripts/`.
//! Every resource path is confined to the package root, both when the catalog
//! is loaded and again on each read. Packs can also be defined in code (see
//! [`inline`]) and merged into the same catalog.

pub mod discovery;
pub mod error;
pub mod index;
pub mod inline;
pub mod parser;
pub mod policy;
pub mod registry;
pub mod resources;
pub mod scripts;

pub use error::{ManifestError, SkillError};
pub use index::{Catalog, LoadReport, Package, PackageSummary};
pub use inline::{InlineResource, InlineSkill, ResourceContent};
pub use parser::Manifest;
pub use policy::ResourcePolicy;
pub use registry::SkillRegistry;
pub use resources::read_resource;
pub use scripts::{InterpreterTable, ScriptOutput, ScriptRunner};
