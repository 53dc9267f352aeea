//! Implementable gate: the full governed document set must exist before a
//! feature may claim implementation readiness.

use std::path::Path;

use crate::parse::{self, Header, SchemaRef};
use crate::report::Finding;

use super::{markdown_files, read_doc, Check, CheckContext};

const NAME: &str = "implementable";

/// Documents a feature must carry, relative to its folder.
pub const REQUIRED_FILES: [&str; 22] = [
    "vision.md",
    "exploration.md",
    "intent_card.md",
    "output_contract.schema.json",
    "action_budget.md",
    "concurrency_model.md",
    "sync_policies.md",
    "reference_set.md",
    "assumptions.md",
    "evaluation_and_tripwires.md",
    "meta_prompts.md",
    "test_plan.md",
    "runtime_concurrency_tests.md",
    "observability_slos.md",
    "manual_tests.md",
    "validation_report.md",
    "audit_log.md",
    "phase_transition.md",
    "CHANGELOG.md",
    "reports/creation_run.md",
    "reports/manual_tests.md",
    "reports/chaos_results.md",
];

pub struct ImplementableCheck;

impl Check for ImplementableCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run(&self, ctx: &CheckContext) -> Vec<Finding> {
        if !ctx.require_implementable {
            return Vec::new();
        }
        let mut findings = Vec::new();
        let Some(fid) = &ctx.feature_id else {
            findings.push(Finding::info(
                NAME,
                &ctx.layout.features_root,
                "FEATURE_ID not set; implementable check skipped",
            ));
            return findings;
        };

        let dir = ctx.layout.feature_dir(fid);
        if !dir.is_dir() {
            findings.push(Finding::fail(NAME, &dir, "feature folder missing"));
            return findings;
        }

        let missing: Vec<&str> = REQUIRED_FILES
            .iter()
            .copied()
            .filter(|rel| !dir.join(rel).is_file())
            .collect();
        if missing.is_empty() {
            findings.push(Finding::ok(NAME, &dir, "all required documents present"));
        } else {
            findings.push(Finding::fail(
                NAME,
                &dir,
                format!("missing required documents: {missing:?}"),
            ));
        }

        scan_headers(&dir, &mut findings);
        findings
    }
}

/// Light header pass over governed documents in the feature folder. The
/// headers checker owns the full contract; readiness only re-verifies the
/// schema binding.
fn scan_headers(dir: &Path, findings: &mut Vec<Finding>) {
    for doc in markdown_files(dir) {
        let text = match read_doc(NAME, &doc) {
            Ok(text) => text,
            Err(finding) => {
                findings.push(finding);
                continue;
            }
        };
        if !parse::is_governed(&text) {
            continue;
        }
        let header = Header::parse(&text);
        let missing = header.missing_required();
        if !missing.is_empty() {
            findings.push(Finding::fail(
                NAME,
                &doc,
                format!("missing header fields: {missing:?}"),
            ));
            continue;
        }
        let schema_ref = header.get("schema_ref").unwrap_or_default();
        let version = header.get("version").unwrap_or_default();
        match SchemaRef::parse(schema_ref) {
            Ok(sr) => {
                if sr.major_matches_version() == Some(false) {
                    findings.push(Finding::fail(
                        NAME,
                        &doc,
                        format!("schema_ref major v{} does not match version {version}", sr.major),
                    ));
                }
            }
            Err(_) => {
                findings.push(Finding::fail(NAME, &doc, "invalid schema_ref format"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use crate::checks::testutil::{app_root, ctx};
    use crate::report::Severity;

    use super::*;

    fn full_feature(dir: &Path, fid: &str) {
        for rel in REQUIRED_FILES {
            let path = dir.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            if rel.ends_with(".json") {
                fs::write(&path, "{}").unwrap();
            } else {
                let dtype = "planning.vision";
                let text = format!(
                    "feature_id: {fid}\n\
doc_type: {dtype}\n\
schema_ref: urn:acme:schema:capsule:{fid}:{dtype}:v0@0.1.0\n\
version: 0.1.0\n\
updated: 2025-06-01\n\n# Doc\n"
                );
                fs::write(&path, text).unwrap();
            }
        }
    }

    #[test]
    fn disabled_without_flag() {
        let tmp = tempdir().unwrap();
        let layout = app_root(tmp.path());
        let mut context = ctx(layout);
        context.feature_id = Some("auth-tokens".into());
        assert!(ImplementableCheck.run(&context).is_empty());
    }

    #[test]
    fn no_feature_id_is_informational() {
        let tmp = tempdir().unwrap();
        let layout = app_root(tmp.path());
        let mut context = ctx(layout);
        context.require_implementable = true;
        let findings = ImplementableCheck.run(&context);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Info);
    }

    #[test]
    fn missing_folder_fails() {
        let tmp = tempdir().unwrap();
        let layout = app_root(tmp.path());
        let mut context = ctx(layout);
        context.feature_id = Some("auth-tokens".into());
        context.require_implementable = true;
        let findings = ImplementableCheck.run(&context);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].message, "feature folder missing");
    }

    #[test]
    fn complete_document_set_is_ok() {
        let tmp = tempdir().unwrap();
        let layout = app_root(tmp.path());
        let dir = layout.feature_dir("auth-tokens");
        fs::create_dir_all(&dir).unwrap();
        full_feature(&dir, "auth-tokens");

        let mut context = ctx(layout);
        context.feature_id = Some("auth-tokens".into());
        context.require_implementable = true;
        let findings = ImplementableCheck.run(&context);
        assert!(findings
            .iter()
            .any(|f| f.message == "all required documents present"));
        assert!(!findings.iter().any(|f| f.severity == Severity::Fail));
    }

    #[test]
    fn missing_documents_are_named() {
        let tmp = tempdir().unwrap();
        let layout = app_root(tmp.path());
        let dir = layout.feature_dir("auth-tokens");
        fs::create_dir_all(&dir).unwrap();
        full_feature(&dir, "auth-tokens");
        fs::remove_file(dir.join("audit_log.md")).unwrap();
        fs::remove_file(dir.join("reports/chaos_results.md")).unwrap();

        let mut context = ctx(layout);
        context.feature_id = Some("auth-tokens".into());
        context.require_implementable = true;
        let findings = ImplementableCheck.run(&context);
        let fail = findings
            .iter()
            .find(|f| f.message.starts_with("missing required documents:"))
            .unwrap();
        assert!(fail.message.contains("audit_log.md"));
        assert!(fail.message.contains("reports/chaos_results.md"));
    }

    #[test]
    fn governed_doc_with_major_drift_fails_readiness() {
        let tmp = tempdir().unwrap();
        let layout = app_root(tmp.path());
        let dir = layout.feature_dir("auth-tokens");
        fs::create_dir_all(&dir).unwrap();
        full_feature(&dir, "auth-tokens");
        fs::write(
            dir.join("vision.md"),
            "feature_id: auth-tokens\n\
doc_type: planning.vision\n\
schema_ref: urn:acme:schema:capsule:auth-tokens:planning.vision:v3@0.1.0\n\
version: 0.1.0\n\
updated: 2025-06-01\n\n# Doc\n",
        )
        .unwrap();

        let mut context = ctx(layout);
        context.feature_id = Some("auth-tokens".into());
        context.require_implementable = true;
        let findings = ImplementableCheck.run(&context);
        assert!(findings
            .iter()
            .any(|f| f.message == "schema_ref major v3 does not match version 0.1.0"));
    }
}
