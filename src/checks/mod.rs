//! Checkers - Read-Only Document Validation
//!
//! Each checker implements [`Check`]: a name and a pure scan that maps
//! documents to findings. Checkers never write to the tree and never
//! consult ambient state; everything they need arrives in
//! [`CheckContext`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Layout;
use crate::report::Finding;

pub mod acceptance;
pub mod concurrency;
pub mod creation_run;
pub mod headers;
pub mod implementable;
pub mod leak_size;
pub mod registry;
pub mod unknowns;

/// A single read-only validation pass.
pub trait Check {
    /// Stable identifier, used in findings and logs.
    fn name(&self) -> &'static str;

    /// Scan the tree described by `ctx` and report findings. Must not
    /// modify anything under the app root.
    fn run(&self, ctx: &CheckContext) -> Vec<Finding>;
}

/// Everything a checker is allowed to know, passed explicitly.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub layout: Layout,
    /// Restrict scanning to one feature when set.
    pub feature_id: Option<String>,
    /// Restrict the headers checker to one document when set.
    pub doc_path: Option<PathBuf>,
    /// Enforce the full required-documents contract.
    pub require_implementable: bool,
    /// Downgrade the hard size gate to a warning.
    pub allow_oversize: bool,
    /// Additional leak patterns beyond the built-ins.
    pub extra_leak_patterns: Vec<String>,
}

impl CheckContext {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            feature_id: None,
            doc_path: None,
            require_implementable: false,
            allow_oversize: false,
            extra_leak_patterns: Vec::new(),
        }
    }

    /// Feature directories in scope, capsule side then features side.
    /// With a feature id set, only that feature's existing directories;
    /// otherwise every feature directory under both roots.
    pub fn all_feature_dirs(&self) -> Vec<PathBuf> {
        match &self.feature_id {
            Some(fid) => [
                self.layout.capsule_dir(fid),
                self.layout.feature_dir(fid),
            ]
            .into_iter()
            .filter(|p| p.is_dir())
            .collect(),
            None => {
                let mut dirs = subdirs(&self.layout.capsule_root);
                dirs.retain(|d| d != &self.layout.program_reports_dir());
                dirs.extend(subdirs(&self.layout.features_root));
                dirs
            }
        }
    }

    /// Feature directories on the features side only.
    pub fn features_side_dirs(&self) -> Vec<PathBuf> {
        match &self.feature_id {
            Some(fid) => {
                let dir = self.layout.feature_dir(fid);
                if dir.is_dir() {
                    vec![dir]
                } else {
                    Vec::new()
                }
            }
            None => subdirs(&self.layout.features_root),
        }
    }
}

fn subdirs(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

/// All markdown files under `root`, sorted for deterministic output.
pub fn markdown_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map(|x| x == "md").unwrap_or(false))
        .collect();
    files.sort();
    files
}

/// Read a document, mapping failures to a FAIL finding instead of an error.
pub fn read_doc(check: &'static str, path: &Path) -> Result<String, Finding> {
    fs::read_to_string(path)
        .map_err(|e| Finding::fail(check, path, format!("unreadable: {e}")))
}

/// Read a document that may legitimately be absent.
pub fn read_doc_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
