//! Output Contract Evolution - Versioned Schema Changes
//!
//! The contract file is treated as opaque JSON apart from `version` and
//! `$id`; a bump rewrites those, preserves everything else, and records
//! the change in the feature CHANGELOG.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use serde_json::Value;
use thiserror::Error;

use crate::DEFAULT_FEATURE_VERSION;

pub const CONTRACT_FILE: &str = "output_contract.schema.json";
pub const CHANGELOG_FILE: &str = "CHANGELOG.md";

static ID_MAJOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r":v\d+$").unwrap());

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("contract not found: {0}")]
    Missing(PathBuf),

    #[error("contract unreadable at {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("contract is not valid JSON at {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid version '{0}'")]
    BadVersion(String),

    #[error("write failed at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpKind {
    Patch,
    Minor,
    Major,
}

/// Requested version change: a SemVer bump or an explicit value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionChange {
    Bump(BumpKind),
    Set(String),
}

/// Result of an applied change, for display.
#[derive(Debug, Clone)]
pub struct BumpOutcome {
    pub previous: String,
    pub version: String,
    pub id: Option<String>,
}

pub fn bump_version(version: &Version, kind: BumpKind) -> Version {
    match kind {
        BumpKind::Patch => Version::new(version.major, version.minor, version.patch + 1),
        BumpKind::Minor => Version::new(version.major, version.minor + 1, 0),
        BumpKind::Major => Version::new(version.major + 1, 0, 0),
    }
}

/// Apply a version change to the contract in `feature_dir` and append a
/// CHANGELOG entry. The `$id` major marker is rewritten only on a MAJOR
/// bump; an explicit `Set` never touches it.
pub fn apply_change(
    feature_dir: &Path,
    change: &VersionChange,
    note: &str,
) -> Result<BumpOutcome, ContractError> {
    let path = feature_dir.join(CONTRACT_FILE);
    if !path.is_file() {
        return Err(ContractError::Missing(path));
    }
    let text = fs::read_to_string(&path).map_err(|source| ContractError::Unreadable {
        path: path.clone(),
        source,
    })?;
    let mut value: Value =
        serde_json::from_str(&text).map_err(|source| ContractError::Invalid {
            path: path.clone(),
            source,
        })?;

    let previous = value
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_FEATURE_VERSION)
        .to_string();
    let next = match change {
        VersionChange::Bump(kind) => {
            let current = Version::parse(&previous)
                .map_err(|_| ContractError::BadVersion(previous.clone()))?;
            bump_version(&current, *kind)
        }
        VersionChange::Set(raw) => {
            Version::parse(raw).map_err(|_| ContractError::BadVersion(raw.clone()))?
        }
    };

    value["version"] = Value::String(next.to_string());
    let mut new_id = None;
    if matches!(change, VersionChange::Bump(BumpKind::Major)) {
        if let Some(old_id) = value.get("$id").and_then(Value::as_str) {
            let rewritten = ID_MAJOR_RE
                .replace(old_id, format!(":v{}", next.major))
                .into_owned();
            value["$id"] = Value::String(rewritten.clone());
            new_id = Some(rewritten);
        }
    } else {
        new_id = value.get("$id").and_then(Value::as_str).map(str::to_string);
    }

    save_pretty(&path, &value)?;
    append_changelog(feature_dir, &next.to_string(), note)?;

    Ok(BumpOutcome {
        previous,
        version: next.to_string(),
        id: new_id,
    })
}

fn save_pretty(path: &Path, value: &Value) -> Result<(), ContractError> {
    let mut text = serde_json::to_string_pretty(value).map_err(|source| ContractError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;
    text.push('\n');
    fs::write(path, text).map_err(|source| ContractError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn append_changelog(feature_dir: &Path, version: &str, note: &str) -> Result<(), ContractError> {
    let path = feature_dir.join(CHANGELOG_FILE);
    let mut text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::from("# CHANGELOG\n\n"),
        Err(source) => {
            return Err(ContractError::Unreadable {
                path,
                source,
            })
        }
    };
    let today = Local::now().format("%Y-%m-%d");
    text.push_str(&format!("{today} | {version} | planning.output_contract: {note}\n"));
    fs::write(&path, text).map_err(|source| ContractError::Write { path, source })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    const CONTRACT: &str = r#"{
  "$id": "urn:acme:schema:capsule:auth-tokens:planning.output_contract:v1",
  "version": "1.2.3",
  "required": ["session_token"]
}"#;

    #[test]
    fn bump_arithmetic() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(bump_version(&v, BumpKind::Patch).to_string(), "1.2.4");
        assert_eq!(bump_version(&v, BumpKind::Minor).to_string(), "1.3.0");
        assert_eq!(bump_version(&v, BumpKind::Major).to_string(), "2.0.0");
    }

    #[test]
    fn bump_clears_prerelease() {
        let v = Version::parse("1.2.3-rc.1").unwrap();
        assert_eq!(bump_version(&v, BumpKind::Patch).to_string(), "1.2.4");
    }

    #[test]
    fn patch_bump_keeps_id() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join(CONTRACT_FILE), CONTRACT).unwrap();

        let outcome =
            apply_change(tmp.path(), &VersionChange::Bump(BumpKind::Patch), "fix").unwrap();
        assert_eq!(outcome.previous, "1.2.3");
        assert_eq!(outcome.version, "1.2.4");
        assert_eq!(
            outcome.id.as_deref(),
            Some("urn:acme:schema:capsule:auth-tokens:planning.output_contract:v1")
        );

        let saved: Value =
            serde_json::from_str(&fs::read_to_string(tmp.path().join(CONTRACT_FILE)).unwrap())
                .unwrap();
        assert_eq!(saved["version"], "1.2.4");
        assert_eq!(saved["required"][0], "session_token");
    }

    #[test]
    fn major_bump_rewrites_id() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join(CONTRACT_FILE), CONTRACT).unwrap();

        let outcome =
            apply_change(tmp.path(), &VersionChange::Bump(BumpKind::Major), "breaking").unwrap();
        assert_eq!(outcome.version, "2.0.0");
        assert_eq!(
            outcome.id.as_deref(),
            Some("urn:acme:schema:capsule:auth-tokens:planning.output_contract:v2")
        );
    }

    #[test]
    fn explicit_set_never_touches_id() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join(CONTRACT_FILE), CONTRACT).unwrap();

        let outcome =
            apply_change(tmp.path(), &VersionChange::Set("9.0.0".into()), "jump").unwrap();
        assert_eq!(outcome.version, "9.0.0");
        assert_eq!(
            outcome.id.as_deref(),
            Some("urn:acme:schema:capsule:auth-tokens:planning.output_contract:v1")
        );
    }

    #[test]
    fn invalid_set_version_rejected() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join(CONTRACT_FILE), CONTRACT).unwrap();

        let err = apply_change(tmp.path(), &VersionChange::Set("not-semver".into()), "x")
            .unwrap_err();
        assert!(matches!(err, ContractError::BadVersion(_)));
    }

    #[test]
    fn changelog_created_and_appended() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join(CONTRACT_FILE), CONTRACT).unwrap();

        apply_change(tmp.path(), &VersionChange::Bump(BumpKind::Patch), "first").unwrap();
        apply_change(tmp.path(), &VersionChange::Bump(BumpKind::Patch), "second").unwrap();

        let log = fs::read_to_string(tmp.path().join(CHANGELOG_FILE)).unwrap();
        assert!(log.starts_with("# CHANGELOG\n\n"));
        assert!(log.contains("| 1.2.4 | planning.output_contract: first\n"));
        assert!(log.contains("| 1.2.5 | planning.output_contract: second\n"));
    }

    #[test]
    fn missing_contract_is_an_error() {
        let tmp = tempdir().unwrap();
        let err =
            apply_change(tmp.path(), &VersionChange::Bump(BumpKind::Patch), "x").unwrap_err();
        assert!(matches!(err, ContractError::Missing(_)));
    }
}
