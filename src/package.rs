//! Packaging - Publish A Feature Into The Final Docs Tree
//!
//! CRITICAL: packaging MUST run the validation pipeline first. No bypass.
//! A bundle is the feature's document tree plus a fingerprinted manifest.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::checks::CheckContext;
use crate::fsops;
use crate::hashing::{bundle_fingerprint, file_sha256};
use crate::parse::word_count;
use crate::pipeline::ValidationPipeline;
use crate::report::Report;
use crate::ENGINE_VERSION;

pub const MANIFEST_FILE: &str = "bundle.manifest.json";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("feature folder missing: {0}")]
    FeatureMissing(PathBuf),

    #[error("validation failed (exit {code})")]
    ValidationFailed { code: i32 },

    #[error("package failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleFile {
    pub path: String,
    pub sha256: String,
    pub words: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub feature_id: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub files: Vec<BundleFile>,
    pub bundle_hash: String,
}

#[derive(Debug)]
pub struct PackageOutcome {
    pub dest: PathBuf,
    pub manifest: BundleManifest,
    pub validation: Report,
}

/// Validate, then copy the feature's tree into the final docs root and
/// write its manifest. Findings and the verdict are printed exactly as
/// the deployer prints them.
pub fn package_feature(ctx: &CheckContext, feature_id: &str) -> Result<PackageOutcome, PackageError> {
    let src = ctx.layout.feature_dir(feature_id);
    if !src.is_dir() {
        return Err(PackageError::FeatureMissing(src));
    }

    let report = ValidationPipeline::new().run(ctx);
    report.print();
    if report.has_failures() {
        let code = report.exit_code();
        println!("Validation: FAIL (exit {code})");
        return Err(PackageError::ValidationFailed { code });
    }
    println!("Validation: PASS");

    let dest = ctx.layout.final_docs_root.join(feature_id);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|source| PackageError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fsops::replace_tree(&src, &dest).map_err(|source| PackageError::Io {
        path: dest.clone(),
        source,
    })?;

    let mut manifest = BundleManifest {
        feature_id: feature_id.to_string(),
        engine_version: ENGINE_VERSION.to_string(),
        created_at: Utc::now(),
        files: bundle_files(&dest)?,
        bundle_hash: String::new(), // Computed after
    };
    manifest.bundle_hash = bundle_fingerprint(&manifest)?;

    let mut text = serde_json::to_string_pretty(&manifest)?;
    text.push('\n');
    let manifest_path = dest.join(MANIFEST_FILE);
    fs::write(&manifest_path, text).map_err(|source| PackageError::Io {
        path: manifest_path,
        source,
    })?;

    Ok(PackageOutcome {
        dest,
        manifest,
        validation: report,
    })
}

fn bundle_files(root: &Path) -> Result<Vec<BundleFile>, PackageError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| PackageError::Io {
            path: root.to_path_buf(),
            source: io::Error::other(e),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| PackageError::Io {
                path: entry.path().to_path_buf(),
                source: io::Error::other(e),
            })?;
        let sha256 = file_sha256(entry.path()).map_err(|source| PackageError::Io {
            path: entry.path().to_path_buf(),
            source,
        })?;
        let words = fs::read_to_string(entry.path())
            .map(|t| word_count(&t))
            .unwrap_or(0);
        files.push(BundleFile {
            path: rel.to_string_lossy().into_owned(),
            sha256,
            words,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
