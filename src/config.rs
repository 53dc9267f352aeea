//! Project Configuration - Loaded Once At The Boundary
//!
//! The engine reads `capsule.project.toml` exactly once, at startup, and
//! passes the resolved [`Layout`] by parameter from there on. Core components
//! never read configuration or environment state on their own.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file expected at the app root.
pub const CONFIG_FILE: &str = "capsule.project.toml";

/// Default template location, relative to the app root.
pub const DEFAULT_TEMPLATE_REL: &str = "templates/feature-capsule/feature-template";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing config: {0}")]
    Missing(PathBuf),

    #[error("unreadable config {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("[project].namespace missing in {0}")]
    MissingNamespace(PathBuf),

    #[error("[paths].{key} missing in {path}")]
    MissingPath { key: &'static str, path: PathBuf },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub paths: PathsSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectSection {
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsSection {
    #[serde(default)]
    pub features: String,
    #[serde(default)]
    pub capsule: String,
    #[serde(default)]
    pub final_docs: String,
    #[serde(default)]
    pub planning: String,
}

impl ProjectConfig {
    /// Load and verify the config file under `app_root`.
    ///
    /// Missing file or missing required keys are fatal: the caller must not
    /// touch the filesystem after this fails.
    pub fn load(app_root: &Path) -> Result<Self, ConfigError> {
        let path = app_root.join(CONFIG_FILE);
        if !path.exists() {
            return Err(ConfigError::Missing(path));
        }
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Unreadable {
            path: path.clone(),
            source,
        })?;
        let config: ProjectConfig =
            toml::from_str(&text).map_err(|source| ConfigError::Invalid {
                path: path.clone(),
                source,
            })?;
        config.verify(&path)?;
        Ok(config)
    }

    fn verify(&self, path: &Path) -> Result<(), ConfigError> {
        if self.project.namespace.trim().is_empty() {
            return Err(ConfigError::MissingNamespace(path.to_path_buf()));
        }
        for (key, value) in [
            ("features", &self.paths.features),
            ("capsule", &self.paths.capsule),
            ("final_docs", &self.paths.final_docs),
            ("planning", &self.paths.planning),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingPath {
                    key,
                    path: path.to_path_buf(),
                });
            }
        }
        Ok(())
    }
}

/// Resolved directory layout for one app root.
///
/// `capsule/<id>` and `features/<id>` are the two live roots per feature;
/// `features/<id>/reports/` holds run logs; `capsule/reports/` is the
/// program-report area and is excluded from document scans.
#[derive(Debug, Clone)]
pub struct Layout {
    pub app_root: PathBuf,
    pub namespace: String,
    pub capsule_root: PathBuf,
    pub features_root: PathBuf,
    pub final_docs_root: PathBuf,
    pub planning_root: PathBuf,
    pub prompts_dir: PathBuf,
}

impl Layout {
    pub fn resolve(app_root: &Path, config: &ProjectConfig) -> Self {
        Self {
            app_root: app_root.to_path_buf(),
            namespace: config.project.namespace.clone(),
            capsule_root: app_root.join(&config.paths.capsule),
            features_root: app_root.join(&config.paths.features),
            final_docs_root: app_root.join(&config.paths.final_docs),
            planning_root: app_root.join(&config.paths.planning),
            prompts_dir: app_root.join("prompts"),
        }
    }

    /// Live capsule destination for a feature.
    pub fn capsule_dir(&self, feature_id: &str) -> PathBuf {
        self.capsule_root.join(feature_id)
    }

    /// Live features destination for a feature.
    pub fn feature_dir(&self, feature_id: &str) -> PathBuf {
        self.features_root.join(feature_id)
    }

    /// Run-log directory inside a feature.
    pub fn reports_dir(&self, feature_id: &str) -> PathBuf {
        self.feature_dir(feature_id).join("reports")
    }

    /// doc_type -> template path registry consumed by the registry checker.
    pub fn registry_path(&self) -> PathBuf {
        self.prompts_dir.join("registry.json")
    }

    /// Program-report area, never scanned for governed documents.
    pub fn program_reports_dir(&self) -> PathBuf {
        self.capsule_root.join("reports")
    }

    /// Optional extra prompt-leakage patterns, one regex per line.
    pub fn forbidden_patterns_path(&self) -> PathBuf {
        self.program_reports_dir()
            .join("validation")
            .join("forbidden_patterns.txt")
    }

    pub fn default_template_dir(&self) -> PathBuf {
        self.app_root.join(DEFAULT_TEMPLATE_REL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const GOOD: &str = r#"
[project]
namespace = "acme"

[paths]
features = "features"
capsule = "capsule"
final_docs = "final_docs"
planning = "planning"
"#;

    #[test]
    fn load_resolves_layout_roots() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), GOOD).unwrap();

        let config = ProjectConfig::load(dir.path()).unwrap();
        let layout = Layout::resolve(dir.path(), &config);

        assert_eq!(layout.namespace, "acme");
        assert_eq!(layout.capsule_dir("auth-tokens"), dir.path().join("capsule/auth-tokens"));
        assert_eq!(layout.feature_dir("auth-tokens"), dir.path().join("features/auth-tokens"));
        assert_eq!(
            layout.reports_dir("auth-tokens"),
            dir.path().join("features/auth-tokens/reports")
        );
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn missing_namespace_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[project]\nnamespace = \"\"\n[paths]\nfeatures = \"f\"\ncapsule = \"c\"\nfinal_docs = \"d\"\nplanning = \"p\"\n",
        )
        .unwrap();
        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingNamespace(_)));
    }

    #[test]
    fn missing_path_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[project]\nnamespace = \"acme\"\n[paths]\nfeatures = \"features\"\ncapsule = \"capsule\"\nfinal_docs = \"final_docs\"\n",
        )
        .unwrap();
        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingPath { key: "planning", .. }));
    }
}
