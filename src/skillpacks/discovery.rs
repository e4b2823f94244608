//! Package directory discovery.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Manifest file name recognized in every package directory.
pub const MANIFEST_FILE: &str = "SKILL.md";

/// How many directory levels below a root are searched.
pub const MAX_SEARCH_DEPTH: usize = 2;

/// Find every directory under `roots` (root itself included, down to
/// [`MAX_SEARCH_DEPTH`] levels) that directly contains a `SKILL.md`.
///
/// Parents come before their children and siblings are visited in file-name
/// order. Blank, missing, or non-directory roots are skipped. A directory
/// reachable from several (overlapping) roots is reported once, at its first
/// sighting.
pub fn discover_package_dirs<P: AsRef<Path>>(roots: &[P]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();

    for root in roots {
        let root = root.as_ref();
        if root.as_os_str().to_string_lossy().trim().is_empty() {
            continue;
        }
        if !root.is_dir() {
            debug!(root = %root.display(), "skipping missing skill root");
            continue;
        }

        let walker = WalkDir::new(root)
            .max_depth(MAX_SEARCH_DEPTH)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            if entry.path().join(MANIFEST_FILE).is_file() {
                let dir = absolute(entry.path());
                let key = fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone());
                if !seen.insert(key) {
                    debug!(dir = %dir.display(), "skill pack already discovered");
                    continue;
                }
                debug!(dir = %dir.display(), "discovered skill pack");
                found.push(dir);
            }
        }
    }

    found
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
