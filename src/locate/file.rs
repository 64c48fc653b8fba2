//! locate::file
//!
//! Turn a filesystem path into an importable namespace identifier.
//!
//! # Rules
//!
//! - A package marker file (`__init__.py` by default) stands for its
//!   directory; any other file must carry the source suffix (`.py`)
//! - Starting from the canonical path, parent directories are collected
//!   while they contain a package marker
//! - The first directory that is not a package is put at the front of the
//!   registry's search path
//!
//! So `proj/pkg/sub/__init__.py` with a marker in `proj/pkg/` becomes
//! `pkg.sub` (with `proj` on the search path), and `proj/mod.py` with no
//! marker in `proj/` becomes `mod`.

use std::fs;
use std::path::{Path, PathBuf};

use super::errors::NoAppError;
use super::registry::Registry;
use super::Identifier;

/// How source files and packages look on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    /// Extension of importable source files, including the dot.
    pub source_suffix: String,
    /// File whose presence makes a directory a package.
    pub package_marker: String,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            source_suffix: ".py".to_string(),
            package_marker: "__init__.py".to_string(),
        }
    }
}

impl SourceLayout {
    pub fn new(source_suffix: impl Into<String>, package_marker: impl Into<String>) -> Self {
        Self {
            source_suffix: source_suffix.into(),
            package_marker: package_marker.into(),
        }
    }

    fn is_package(&self, dir: &Path) -> bool {
        dir.join(&self.package_marker).is_file()
    }
}

/// Derive the identifier for `path` and make its root importable.
///
/// # Errors
///
/// `NoAppError::InvalidSource` if `path` is neither a package marker nor a
/// source file.
pub fn prepare_exec_for_file(registry: &Registry, path: &Path) -> Result<Identifier, NoAppError> {
    let layout = registry.layout();
    let invalid = || NoAppError::InvalidSource {
        path: path.to_path_buf(),
        suffix: layout.source_suffix.clone(),
    };

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(invalid)?;

    let target: PathBuf = if file_name == layout.package_marker {
        path.parent().ok_or_else(invalid)?.to_path_buf()
    } else if let Some(stem) = file_name.strip_suffix(layout.source_suffix.as_str()) {
        if stem.is_empty() {
            return Err(invalid());
        }
        path.with_file_name(stem)
    } else {
        return Err(invalid());
    };

    let target = canonicalize_lossy(&target);

    let mut parts = Vec::new();
    let mut current = target.as_path();
    let root = loop {
        let name = current
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(invalid)?;
        parts.push(name.to_string());
        match current.parent() {
            Some(parent) if layout.is_package(parent) => current = parent,
            Some(parent) => break parent.to_path_buf(),
            None => break PathBuf::new(),
        }
    };

    registry.prepend_search_path(root);
    parts.reverse();
    let identifier = Identifier::new(parts.join("."));
    tracing::debug!(path = %path.display(), %identifier, "derived identifier from file");
    Ok(identifier)
}

/// Canonicalize the parent directory and re-attach the final component.
///
/// The module stem does not exist on disk, so only its directory can be
/// resolved.
fn canonicalize_lossy(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            fs::canonicalize(parent)
                .map(|p| p.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}
