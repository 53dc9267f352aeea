//! Publication Invariant Tests
//!
//! These tests verify the non-negotiable guarantees: validation gates
//! publication, swaps are atomic, rollback is total, and backups never
//! outlive a transaction.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use semver::Version;
use tempfile::tempdir;
use walkdir::WalkDir;

use capsule_engine::deploy::PublishOutcome;
use capsule_engine::package::package_feature;
use capsule_engine::render::{render_template, TokenMap};
use capsule_engine::{
    CheckContext, DeployError, Deployer, Layout, ProjectConfig, ValidationPipeline,
};

const TEMPLATE_REL: &str = "templates/feature-capsule/feature-template";

fn create_app_root(root: &Path, unknown_impact: &str) -> Layout {
    fs::write(
        root.join("capsule.project.toml"),
        r#"[project]
namespace = "acme"

[paths]
features = "docs/features"
capsule = "docs/capsule"
final_docs = "docs/final"
planning = "docs/planning"
"#,
    )
    .unwrap();

    fs::create_dir_all(root.join("prompts")).unwrap();
    fs::write(root.join("prompts/registry.json"), "{}\n").unwrap();

    write_template(root, unknown_impact);

    let config = ProjectConfig::load(root).unwrap();
    let layout = Layout::resolve(root, &config);
    fs::create_dir_all(&layout.capsule_root).unwrap();
    fs::create_dir_all(&layout.features_root).unwrap();
    layout
}

/// Governed template doc with literal `{{...}}` tokens and a v0 schema_ref.
fn template_doc(dtype: &str, body: &str) -> String {
    format!(
        "feature_id: {{{{FEATURE_ID}}}}\n\
doc_type: {dtype}\n\
schema_ref: urn:{{{{PROJECT_NAMESPACE}}}}:schema:capsule:{{{{FEATURE_ID}}}}:{dtype}:v0@{{{{VERSION}}}}\n\
version: {{{{VERSION}}}}\n\
updated: {{{{UPDATED_DATE}}}}\n\
\n\
{body}"
    )
}

fn write_template(root: &Path, unknown_impact: &str) {
    let template = root.join(TEMPLATE_REL);
    fs::create_dir_all(template.join("capsule/{{FEATURE_ID}}")).unwrap();
    fs::create_dir_all(template.join("features/{{FEATURE_ID}}/reports")).unwrap();

    fs::write(
        template.join("capsule/{{FEATURE_ID}}/vision.md"),
        template_doc(
            "planning.vision",
            "# Vision\n\nWhat {{FEATURE_ID}} is for.\n",
        ),
    )
    .unwrap();

    fs::write(
        template.join("features/{{FEATURE_ID}}/assumptions.md"),
        template_doc(
            "planning.assumptions",
            &format!(
                "## Assumptions\n\
\n\
- Sessions are short-lived.\n\
\n\
## UNKNOWN Summary\n\
\n\
ID | Question | Possible Effects | Recommended Actions | Next Step | Impact (High/Moderate/Low)\n\
U1 | Token TTL source of truth? | Drift between docs | Confirm owner | Ask platform team | {unknown_impact}\n"
            ),
        ),
    )
    .unwrap();

    fs::write(
        template.join("features/{{FEATURE_ID}}/reports/creation_run.md"),
        template_doc(
            "governance.creation_run",
            "## Run\n\
\n\
Step | Doc | Gate | Key decisions | Links\n\
1 | vision.md | PASS | seeded from template | -\n\
\n\
## UNKNOWN Summary\n\
\n\
ID | Question | Possible Effects | Recommended Actions | Next Step | Impact (High/Moderate/Low)\n",
        ),
    )
    .unwrap();
}

fn context_for(layout: &Layout, feature_id: &str) -> CheckContext {
    let mut ctx = CheckContext::new(layout.clone());
    ctx.feature_id = Some(feature_id.to_string());
    ctx
}

fn publish_feature(
    layout: &Layout,
    feature_id: &str,
    force: bool,
) -> Result<PublishOutcome, DeployError> {
    let staging = tempdir().unwrap();
    let tokens = TokenMap::new(
        feature_id,
        &layout.namespace,
        &Version::parse("0.1.0").unwrap(),
        "2025-06-01",
    );
    let rendered = render_template(
        &layout.app_root.join(TEMPLATE_REL),
        staging.path(),
        &tokens,
    )
    .unwrap();
    Deployer::new().publish(&context_for(layout, feature_id), &rendered, feature_id, force)
}

/// Relative path -> contents snapshot of a tree.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
    let mut map = BTreeMap::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(root).unwrap().to_path_buf();
            map.insert(rel, fs::read_to_string(entry.path()).unwrap());
        }
    }
    map
}

fn assert_no_siblings(layout: &Layout, feature_id: &str) {
    for root in [&layout.capsule_root, &layout.features_root] {
        assert!(
            !root.join(format!("{feature_id}.__new")).exists(),
            "stale staging under {}",
            root.display()
        );
        assert!(
            !root.join(format!("{feature_id}.__old")).exists(),
            "stale backup under {}",
            root.display()
        );
    }
}

#[test]
fn invariant_valid_feature_publishes() {
    let tmp = tempdir().unwrap();
    let layout = create_app_root(tmp.path(), "Moderate");

    let outcome = publish_feature(&layout, "session-cache", false).unwrap();
    assert!(!outcome.validation.has_failures());

    let vision = fs::read_to_string(layout.capsule_dir("session-cache").join("vision.md")).unwrap();
    assert!(vision.contains(
        "schema_ref: urn:acme:schema:capsule:session-cache:planning.vision:v0@0.1.0"
    ));
    assert!(layout
        .feature_dir("session-cache")
        .join("reports/creation_run.md")
        .is_file());
    assert_no_siblings(&layout, "session-cache");
}

#[test]
fn invariant_publish_gates_on_validation() {
    let tmp = tempdir().unwrap();
    let layout = create_app_root(tmp.path(), "High");

    let err = publish_feature(&layout, "session-cache", false).unwrap_err();
    assert!(matches!(err, DeployError::ValidationFailed { code: 1 }));

    // Rollback is total: no live trees, no leftovers.
    assert!(!layout.capsule_dir("session-cache").exists());
    assert!(!layout.feature_dir("session-cache").exists());
    assert_no_siblings(&layout, "session-cache");
}

#[test]
fn invariant_failed_republish_restores_previous_tree() {
    let tmp = tempdir().unwrap();
    let layout = create_app_root(tmp.path(), "Moderate");
    publish_feature(&layout, "session-cache", false).unwrap();

    let caps_before = snapshot(&layout.capsule_dir("session-cache"));
    let feat_before = snapshot(&layout.feature_dir("session-cache"));

    // The next render carries a blocking unknown.
    write_template(tmp.path(), "High");
    let err = publish_feature(&layout, "session-cache", true).unwrap_err();
    assert!(matches!(err, DeployError::ValidationFailed { .. }));

    assert_eq!(snapshot(&layout.capsule_dir("session-cache")), caps_before);
    assert_eq!(snapshot(&layout.feature_dir("session-cache")), feat_before);
    assert_no_siblings(&layout, "session-cache");
}

#[test]
fn invariant_conflict_without_force_aborts() {
    let tmp = tempdir().unwrap();
    let layout = create_app_root(tmp.path(), "Moderate");
    publish_feature(&layout, "session-cache", false).unwrap();

    let before = snapshot(&layout.capsule_dir("session-cache"));
    let err = publish_feature(&layout, "session-cache", false).unwrap_err();
    assert!(matches!(err, DeployError::Conflict));

    assert_eq!(snapshot(&layout.capsule_dir("session-cache")), before);
    assert_no_siblings(&layout, "session-cache");
}

#[test]
fn invariant_forced_republish_is_idempotent() {
    let tmp = tempdir().unwrap();
    let layout = create_app_root(tmp.path(), "Moderate");

    publish_feature(&layout, "session-cache", false).unwrap();
    let first = snapshot(&layout.capsule_dir("session-cache"));
    publish_feature(&layout, "session-cache", true).unwrap();

    assert_eq!(snapshot(&layout.capsule_dir("session-cache")), first);
    assert_no_siblings(&layout, "session-cache");
}

#[test]
fn invariant_interrupted_swap_is_reconciled_on_entry() {
    let tmp = tempdir().unwrap();
    let layout = create_app_root(tmp.path(), "Moderate");
    publish_feature(&layout, "session-cache", false).unwrap();

    // Simulate a crash between rollback steps: the live capsule tree is
    // gone and only the backup remains.
    let live = layout.capsule_dir("session-cache");
    let backup = layout.capsule_root.join("session-cache.__old");
    let before = snapshot(&live);
    fs::rename(&live, &backup).unwrap();

    // The next publish reconciles first; the restored tree then makes
    // this unforced attempt a conflict.
    let err = publish_feature(&layout, "session-cache", false).unwrap_err();
    assert!(matches!(err, DeployError::Conflict));
    assert_eq!(snapshot(&live), before);
    assert!(!backup.exists());
}

#[test]
fn invariant_package_gates_on_validation() {
    let tmp = tempdir().unwrap();
    let layout = create_app_root(tmp.path(), "High");

    // Place the feature directly so packaging, not publishing, is the
    // gate under test.
    let staging = tempdir().unwrap();
    let tokens = TokenMap::new(
        "session-cache",
        &layout.namespace,
        &Version::parse("0.1.0").unwrap(),
        "2025-06-01",
    );
    let rendered = render_template(
        &layout.app_root.join(TEMPLATE_REL),
        staging.path(),
        &tokens,
    )
    .unwrap();
    fs::create_dir_all(&layout.features_root).unwrap();
    copy_dir(
        rendered.features_dir.as_ref().unwrap(),
        &layout.feature_dir("session-cache"),
    );

    let err = package_feature(&context_for(&layout, "session-cache"), "session-cache").unwrap_err();
    assert_eq!(err.to_string(), "validation failed (exit 1)");
    assert!(!layout.final_docs_root.join("session-cache").exists());
}

#[test]
fn invariant_bundle_manifest_hashes_files() {
    let tmp = tempdir().unwrap();
    let layout = create_app_root(tmp.path(), "Moderate");
    publish_feature(&layout, "session-cache", false).unwrap();

    let outcome = package_feature(&context_for(&layout, "session-cache"), "session-cache").unwrap();
    assert_eq!(outcome.manifest.feature_id, "session-cache");
    assert_eq!(outcome.manifest.bundle_hash.len(), 64);
    assert!(!outcome.manifest.files.is_empty());
    for file in &outcome.manifest.files {
        let on_disk = fs::read(outcome.dest.join(&file.path)).unwrap();
        assert_eq!(
            file.sha256,
            capsule_engine::hashing::sha256_hex(&on_disk),
            "hash drift for {}",
            file.path
        );
    }
}

#[test]
fn invariant_findings_use_path_level_message_lines() {
    let tmp = tempdir().unwrap();
    let layout = create_app_root(tmp.path(), "Moderate");
    publish_feature(&layout, "session-cache", false).unwrap();

    let report = ValidationPipeline::new().run(&context_for(&layout, "session-cache"));
    assert!(!report.has_failures());
    let vision_line = report
        .findings
        .iter()
        .map(|f| f.to_string())
        .find(|l| l.contains("vision.md"))
        .unwrap();
    assert!(vision_line.ends_with(": OK: header is valid"));
}

fn copy_dir(src: &Path, dest: &Path) {
    for entry in WalkDir::new(src) {
        let entry = entry.unwrap();
        let rel = entry.path().strip_prefix(src).unwrap();
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else {
            fs::create_dir_all(target.parent().unwrap()).unwrap();
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}
