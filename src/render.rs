//! Template Rendering - Tokens In, Governed Docs Out
//!
//! Rendering is a pure tree-to-tree transform into a staging directory.
//! Nothing rendered is live until the deployer swaps it in.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use semver::Version;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template not found: {0}")]
    TemplateMissing(PathBuf),

    #[error("template has neither capsule/ nor features/ tree: {0}")]
    EmptyTemplate(PathBuf),

    #[error("render failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Substitution values for the `{{...}}` tokens templates may carry.
/// All four expand in file contents; only the feature id and namespace
/// expand in file and directory names.
#[derive(Debug, Clone)]
pub struct TokenMap {
    pub feature_id: String,
    pub namespace: String,
    pub version: String,
    pub date: String,
}

impl TokenMap {
    pub fn new(feature_id: &str, namespace: &str, version: &Version, date: &str) -> Self {
        Self {
            feature_id: feature_id.to_string(),
            namespace: namespace.to_string(),
            version: version.to_string(),
            date: date.to_string(),
        }
    }

    pub fn expand(&self, input: &str) -> String {
        input
            .replace("{{FEATURE_ID}}", &self.feature_id)
            .replace("{{PROJECT_NAMESPACE}}", &self.namespace)
            .replace("{{VERSION}}", &self.version)
            .replace("{{UPDATED_DATE}}", &self.date)
    }

    fn expand_name(&self, input: &str) -> String {
        input
            .replace("{{FEATURE_ID}}", &self.feature_id)
            .replace("{{PROJECT_NAMESPACE}}", &self.namespace)
    }
}

/// A rendered feature staged under `root`, one subtree per destination
/// side. A side is absent when the template does not carry it.
#[derive(Debug, Clone)]
pub struct RenderedTree {
    pub root: PathBuf,
    pub capsule_dir: Option<PathBuf>,
    pub features_dir: Option<PathBuf>,
}

/// Render `template_dir` into `staging_root`: every file is copied with
/// tokens expanded in its contents and in its path components, so a
/// template `capsule/{{FEATURE_ID}}/` subtree lands at
/// `<staging>/capsule/<feature_id>`. Files that are not UTF-8 text are
/// copied verbatim.
pub fn render_template(
    template_dir: &Path,
    staging_root: &Path,
    tokens: &TokenMap,
) -> Result<RenderedTree, RenderError> {
    if !template_dir.is_dir() {
        return Err(RenderError::TemplateMissing(template_dir.to_path_buf()));
    }

    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| RenderError::Io { path, source }
    };

    fs::create_dir_all(staging_root).map_err(io_err(staging_root))?;
    let mut rendered = 0usize;
    for entry in WalkDir::new(template_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| RenderError::Io {
            path: template_dir.to_path_buf(),
            source: io::Error::other(e),
        })?;
        let rel = entry
            .path()
            .strip_prefix(template_dir)
            .map_err(|e| RenderError::Io {
                path: entry.path().to_path_buf(),
                source: io::Error::other(e),
            })?;
        let mut target = staging_root.to_path_buf();
        for comp in rel.components() {
            target.push(tokens.expand_name(&comp.as_os_str().to_string_lossy()));
        }
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(io_err(&target))?;
        } else {
            match fs::read_to_string(entry.path()) {
                Ok(text) => {
                    fs::write(&target, tokens.expand(&text)).map_err(io_err(&target))?;
                }
                Err(_) => {
                    fs::copy(entry.path(), &target).map_err(io_err(entry.path()))?;
                }
            }
            rendered += 1;
        }
    }
    debug!("rendered {rendered} files into {}", staging_root.display());

    let side = |name: &str| {
        let dir = staging_root.join(name).join(&tokens.feature_id);
        dir.is_dir().then_some(dir)
    };
    let tree = RenderedTree {
        root: staging_root.to_path_buf(),
        capsule_dir: side("capsule"),
        features_dir: side("features"),
    };
    if tree.capsule_dir.is_none() && tree.features_dir.is_none() {
        return Err(RenderError::EmptyTemplate(template_dir.to_path_buf()));
    }
    Ok(tree)
}
