//! Lazy, re-validated reads of package resources.

use super::error::SkillError;
use super::index::{Catalog, Package};
use super::policy::ResourcePolicy;
use tracing::info;

/// Read `resource` from the named package in `catalog`.
pub async fn read_resource(
    catalog: &Catalog,
    package: &str,
    resource: &str,
) -> Result<String, SkillError> {
    if package.trim().is_empty() {
        return Err(SkillError::InvalidArgument(
            "package name cannot be empty".to_string(),
        ));
    }
    let pkg = catalog.get(package).ok_or_else(|| SkillError::PackageNotFound {
        name: package.to_string(),
    })?;
    read_package_resource(pkg, resource, catalog.policy()).await
}

/// Read a declared resource of `package`.
///
/// The name must have been declared at load time, and the path policy runs
/// again against the current filesystem before the file is opened: the file
/// may have been swapped for a symlink since the catalog was built. Inline
/// packs are served from memory; computed resources run on every read.
pub async fn read_package_resource(
    package: &Package,
    resource: &str,
    policy: &ResourcePolicy,
) -> Result<String, SkillError> {
    if resource.trim().is_empty() {
        return Err(SkillError::InvalidArgument(
            "resource name cannot be empty".to_string(),
        ));
    }
    let declared = package
        .resource(resource)
        .ok_or_else(|| SkillError::ResourceNotDeclared {
            package: package.name.clone(),
            resource: resource.to_string(),
        })?;

    if let Some(inline) = &package.inline_resources {
        let entry = inline
            .get(declared)
            .ok_or_else(|| SkillError::ResourceNotFound {
                path: declared.to_string(),
            })?;
        info!(package = %package.name, resource = %declared, "reading inline skill resource");
        return entry
            .read()
            .map_err(|reason| SkillError::InlineResourceFailed {
                package: package.name.clone(),
                resource: declared.to_string(),
                reason,
            });
    }

    let path = policy.admit(&package.source_path, declared)?;
    info!(package = %package.name, resource = %declared, "reading skill resource");

    tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| SkillError::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skillpacks::inline::{InlineResource, InlineSkill};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn catalog_with(root: &Path, body: &str) -> Catalog {
        let dir = root.join("calc");
        fs::create_dir_all(dir.join("refs")).unwrap();
        fs::write(
            dir.join("SKILL.md"),
            format!("---\nname: calc\ndescription: does math\n---\n{}\n", body),
        )
        .unwrap();
        fs::write(dir.join("refs/guide.md"), "# Guide\nadd numbers").unwrap();
        Catalog::load(&[root], ResourcePolicy::permissive())
    }

    #[tokio::test]
    async fn test_reads_declared_resource() {
        let td = TempDir::new().unwrap();
        let catalog = catalog_with(td.path(), "[g](refs/guide.md)");
        let text = read_resource(&catalog, "calc", "refs/guide.md").await.unwrap();
        assert_eq!(text, "# Guide\nadd numbers");

        let text = read_resource(&catalog, "CALC", "./Refs/Guide.md").await;
        assert!(text.is_ok());
    }

    #[tokio::test]
    async fn test_reflects_edits_after_load() {
        let td = TempDir::new().unwrap();
        let catalog = catalog_with(td.path(), "[g](refs/guide.md)");
        fs::write(td.path().join("calc/refs/guide.md"), "updated").unwrap();
        let text = read_resource(&catalog, "calc", "refs/guide.md").await.unwrap();
        assert_eq!(text, "updated");
    }

    #[tokio::test]
    async fn test_undeclared_and_unknown() {
        let td = TempDir::new().unwrap();
        let catalog = catalog_with(td.path(), "[g](refs/guide.md)");
        fs::write(td.path().join("calc/refs/other.md"), "other").unwrap();

        assert!(matches!(
            read_resource(&catalog, "calc", "refs/other.md").await,
            Err(SkillError::ResourceNotDeclared { .. })
        ));
        assert!(matches!(
            read_resource(&catalog, "nope", "refs/guide.md").await,
            Err(SkillError::PackageNotFound { .. })
        ));
        assert!(matches!(
            read_resource(&catalog, "calc", "  ").await,
            Err(SkillError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_deleted_after_load_is_not_found() {
        let td = TempDir::new().unwrap();
        let catalog = catalog_with(td.path(), "[g](refs/guide.md)");
        fs::remove_file(td.path().join("calc/refs/guide.md")).unwrap();
        assert!(matches!(
            read_resource(&catalog, "calc", "refs/guide.md").await,
            Err(SkillError::ResourceNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_swapped_for_symlink_after_load() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.md"), "secret").unwrap();

        let td = TempDir::new().unwrap();
        let catalog = catalog_with(td.path(), "[g](refs/guide.md)");
        let guide = td.path().join("calc/refs/guide.md");
        fs::remove_file(&guide).unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.md"), &guide).unwrap();

        let err = read_resource(&catalog, "calc", "refs/guide.md")
            .await
            .unwrap_err();
        assert!(matches!(err, SkillError::SymlinkEscape { .. }));
        assert_eq!(err.public_message(), "resource 'refs/guide.md' not found");
    }

    #[tokio::test]
    async fn test_inline_resources() {
        let td = TempDir::new().unwrap();
        let inline = vec![InlineSkill::new("db", "Database operations", "Query carefully.")
            .resource(InlineResource::text("refs/Schema.sql", "CREATE TABLE t"))
            .resource(InlineResource::computed("status", || Ok("healthy".to_string())))
            .resource(InlineResource::computed("broken", || {
                Err("connection refused".to_string())
            }))];
        let catalog =
            Catalog::load_with_inline(&[td.path()], ResourcePolicy::with_default_extensions(), &inline);

        let text = read_resource(&catalog, "db", "./refs/schema.sql").await.unwrap();
        assert_eq!(text, "CREATE TABLE t");
        assert_eq!(read_resource(&catalog, "db", "status").await.unwrap(), "healthy");

        let err = read_resource(&catalog, "db", "broken").await.unwrap_err();
        assert!(matches!(err, SkillError::InlineResourceFailed { .. }));
        assert_eq!(
            err.public_message(),
            "resource 'broken' of package 'db' failed: connection refused"
        );

        assert!(matches!(
            read_resource(&catalog, "db", "other").await,
            Err(SkillError::ResourceNotDeclared { .. })
        ));
    }
}
