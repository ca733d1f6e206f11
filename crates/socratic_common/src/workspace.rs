//! Workspace scanning for mentor chat context.

use socratic_shared::context::{build_workspace_context, WorkspaceContext};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Files larger than this are listed in the tree but not read
pub const MAX_FILE_BYTES: u64 = 256 * 1024;

/// Files visited per scan
pub const MAX_SCANNED_FILES: usize = 500;

const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "__pycache__",
    "dist",
    "build",
    "venv",
];

/// Text contents of a project, keyed by `/`-separated relative path.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceFiles {
    pub files: BTreeMap<String, String>,
    pub tree: Vec<String>,
}

impl WorkspaceFiles {
    /// Context for `active`, a path relative to the scanned root.
    pub fn context_for(&self, active: &str) -> Option<WorkspaceContext> {
        build_workspace_context(active, &self.files, &self.tree)
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || (entry.file_type().is_dir() && SKIPPED_DIRS.contains(&name.as_ref()))
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Walk `root`, collecting readable UTF-8 files.
pub fn scan_workspace(root: &Path) -> io::Result<WorkspaceFiles> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }

    let mut out = WorkspaceFiles::default();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if out.tree.len() >= MAX_SCANNED_FILES {
            debug!("Workspace scan stopped at {} files", MAX_SCANNED_FILES);
            break;
        }
        let Some(rel) = relative_path(root, entry.path()) else {
            continue;
        };
        out.tree.push(rel.clone());

        let small = entry
            .metadata()
            .map(|m| m.len() <= MAX_FILE_BYTES)
            .unwrap_or(false);
        if !small {
            continue;
        }
        // Binary files fail UTF-8 decoding and are left out
        if let Ok(content) = fs::read_to_string(entry.path()) {
            out.files.insert(rel, content);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_skips_hidden_and_vendor_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("src/main.py"), "from .util import f\n").unwrap();
        fs::write(root.join("src/util.py"), "def f(): pass\n").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(root.join(".git/HEAD"), "ref").unwrap();
        fs::write(root.join("blob.bin"), [0xffu8, 0xfe, 0x00]).unwrap();

        let ws = scan_workspace(root).unwrap();
        assert_eq!(ws.tree, vec!["blob.bin", "src/main.py", "src/util.py"]);
        assert!(!ws.files.contains_key("blob.bin"));

        let ctx = ws.context_for("src/main.py").unwrap();
        assert_eq!(ctx.related_files[0].path, "src/util.py");
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_workspace(&dir.path().join("nope")).is_err());
    }
}
