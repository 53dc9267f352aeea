//! Header contract: five ordered fields binding a document to its schema.

use std::path::PathBuf;

use crate::parse::{
    self, Header, SchemaRef, HEADER_KEYS,
};
use crate::report::Finding;

use super::{markdown_files, read_doc, Check, CheckContext};

const NAME: &str = "headers";

pub struct HeadersCheck;

impl Check for HeadersCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run(&self, ctx: &CheckContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        for doc in targets(ctx) {
            let text = match read_doc(NAME, &doc) {
                Ok(text) => text,
                Err(finding) => {
                    findings.push(finding);
                    continue;
                }
            };
            // Without an explicit document, ungoverned files are out of
            // scope.
            if ctx.doc_path.is_none() && !parse::is_governed(&text) {
                continue;
            }
            let before = findings.len();
            check_document(&doc, &text, &ctx.layout.namespace, &mut findings);
            if findings.len() == before {
                findings.push(Finding::ok(NAME, &doc, "header is valid"));
            }
        }
        findings
    }
}

fn targets(ctx: &CheckContext) -> Vec<PathBuf> {
    if let Some(doc) = &ctx.doc_path {
        return vec![doc.clone()];
    }
    let mut files = Vec::new();
    for dir in ctx.all_feature_dirs() {
        files.extend(markdown_files(&dir));
    }
    files
}

/// Every rule reports independently: a missing field never hides an
/// invalid one elsewhere in the header.
fn check_document(
    doc: &PathBuf,
    text: &str,
    namespace: &str,
    findings: &mut Vec<Finding>,
) {
    let header = Header::parse(text);
    let missing = header.missing_required();
    if !missing.is_empty() {
        findings.push(Finding::fail(
            NAME,
            doc,
            format!("missing header fields: {}", missing.join(", ")),
        ));
    }

    let field = |key: &str| header.get(key).filter(|v| !v.is_empty());
    let fid = field("feature_id");
    let dtype = field("doc_type");
    let version = field("version");

    if let Some(fid) = fid {
        if !parse::is_valid_feature_id(fid) {
            findings.push(Finding::fail(NAME, doc, format!("invalid feature_id '{fid}'")));
        }
    }
    if let Some(version) = version {
        if parse::parse_version(version).is_none() {
            findings.push(Finding::fail(
                NAME,
                doc,
                format!("invalid version '{version}' (semver)"),
            ));
        }
    }
    if let Some(updated) = field("updated") {
        if !parse::is_valid_updated(updated) {
            findings.push(Finding::fail(
                NAME,
                doc,
                format!("invalid updated date '{updated}' (YYYY-MM-DD)"),
            ));
        }
    }
    if let Some(dtype) = dtype {
        if !parse::is_valid_doc_type(dtype) {
            findings.push(Finding::fail(NAME, doc, format!("invalid doc_type '{dtype}'")));
        }
    }

    match SchemaRef::parse(header.get("schema_ref").unwrap_or_default()) {
        Ok(sr) => {
            if let Some(fid) = fid {
                if sr.feature_id != fid {
                    findings.push(Finding::fail(
                        NAME,
                        doc,
                        format!(
                            "schema_ref feature_id mismatch (header {fid} vs ref {})",
                            sr.feature_id
                        ),
                    ));
                }
            }
            if let Some(dtype) = dtype {
                if sr.doc_type != dtype {
                    findings.push(Finding::fail(
                        NAME,
                        doc,
                        format!(
                            "schema_ref doc_type mismatch (header {dtype} vs ref {})",
                            sr.doc_type
                        ),
                    ));
                }
            }
            if let Some(version) = version {
                if sr.version != version {
                    findings.push(Finding::fail(
                        NAME,
                        doc,
                        format!(
                            "schema_ref version mismatch (header {version} vs ref {})",
                            sr.version
                        ),
                    ));
                }
            }
            if !namespace.is_empty() && sr.namespace != namespace {
                findings.push(Finding::fail(
                    NAME,
                    doc,
                    format!("schema_ref namespace mismatch (expected {namespace})"),
                ));
            }
            if sr.major_matches_version() == Some(false) {
                findings.push(Finding::fail(
                    NAME,
                    doc,
                    format!(
                        "schema_ref major v{} does not match version {}",
                        sr.major, sr.version
                    ),
                ));
            }
        }
        Err(_) => {
            findings.push(Finding::fail(NAME, doc, "invalid schema_ref format"));
        }
    }

    if parse::leading_keys(text) != HEADER_KEYS {
        findings.push(Finding::fail(
            NAME,
            doc,
            format!(
                "header keys out of canonical order (expected {})",
                HEADER_KEYS.join(", ")
            ),
        ));
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use crate::checks::testutil::{app_root, ctx, governed_doc};
    use crate::report::Severity;

    use super::*;

    #[test]
    fn valid_header_yields_single_ok() {
        let tmp = tempdir().unwrap();
        let layout = app_root(tmp.path());
        let dir = layout.capsule_dir("auth-tokens");
        governed_doc(&dir, "vision.md", "auth-tokens", "planning.vision", "# Vision\n");

        let check = HeadersCheck;
        let findings = check.run(&ctx(layout));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Ok);
        assert_eq!(findings[0].message, "header is valid");
    }

    #[test]
    fn missing_fields_fail_without_masking_other_rules() {
        let tmp = tempdir().unwrap();
        let layout = app_root(tmp.path());
        let dir = layout.capsule_dir("auth-tokens");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("vision.md"),
            "feature_id: auth-tokens\ndoc_type: planning.vision\n\n# Vision\n",
        )
        .unwrap();

        let findings = HeadersCheck.run(&ctx(layout));
        assert!(findings.iter().all(|f| f.severity == Severity::Fail));
        let messages: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            messages[0],
            "missing header fields: schema_ref, version, updated"
        );
        assert!(messages.contains(&"invalid schema_ref format"));
        assert!(messages
            .iter()
            .any(|m| m.starts_with("header keys out of canonical order")));
    }

    #[test]
    fn out_of_order_keys_fail() {
        let tmp = tempdir().unwrap();
        let layout = app_root(tmp.path());
        let dir = layout.capsule_dir("auth-tokens");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("vision.md"),
            "doc_type: planning.vision\n\
feature_id: auth-tokens\n\
schema_ref: urn:acme:schema:capsule:auth-tokens:planning.vision:v0@0.1.0\n\
version: 0.1.0\n\
updated: 2025-06-01\n\n# Vision\n",
        )
        .unwrap();

        let findings = HeadersCheck.run(&ctx(layout));
        assert!(findings
            .iter()
            .any(|f| f.message.starts_with("header keys out of canonical order")));
    }

    #[test]
    fn cross_field_mismatches_fail() {
        let tmp = tempdir().unwrap();
        let layout = app_root(tmp.path());
        let dir = layout.capsule_dir("auth-tokens");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("vision.md"),
            "feature_id: auth-tokens\n\
doc_type: planning.vision\n\
schema_ref: urn:acme:schema:capsule:other-feature:planning.vision:v2@0.1.0\n\
version: 0.1.0\n\
updated: 2025-06-01\n\n# Vision\n",
        )
        .unwrap();

        let findings = HeadersCheck.run(&ctx(layout));
        let messages: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
        assert!(messages
            .iter()
            .any(|m| m.starts_with("schema_ref feature_id mismatch")));
        assert!(messages
            .iter()
            .any(|m| m.starts_with("schema_ref major v2 does not match")));
    }

    #[test]
    fn namespace_mismatch_fails() {
        let tmp = tempdir().unwrap();
        let layout = app_root(tmp.path());
        let dir = layout.capsule_dir("auth-tokens");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("vision.md"),
            "feature_id: auth-tokens\n\
doc_type: planning.vision\n\
schema_ref: urn:globex:schema:capsule:auth-tokens:planning.vision:v0@0.1.0\n\
version: 0.1.0\n\
updated: 2025-06-01\n\n# Vision\n",
        )
        .unwrap();

        let findings = HeadersCheck.run(&ctx(layout));
        assert!(findings
            .iter()
            .any(|f| f.message == "schema_ref namespace mismatch (expected acme)"));
    }

    #[test]
    fn ungoverned_files_skipped_without_explicit_doc() {
        let tmp = tempdir().unwrap();
        let layout = app_root(tmp.path());
        let dir = layout.capsule_dir("auth-tokens");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("notes.md"), "# Scratch notes, no header\n").unwrap();

        let findings = HeadersCheck.run(&ctx(layout));
        assert!(findings.is_empty());
    }

    #[test]
    fn explicit_doc_is_checked_even_when_ungoverned() {
        let tmp = tempdir().unwrap();
        let layout = app_root(tmp.path());
        let doc = tmp.path().join("loose.md");
        fs::write(&doc, "# No header at all\n").unwrap();

        let mut context = ctx(layout);
        context.doc_path = Some(doc);
        let findings = HeadersCheck.run(&context);
        assert!(!findings.is_empty());
        assert!(findings.iter().all(|f| f.severity == Severity::Fail));
        assert!(findings[0]
            .message
            .starts_with("missing header fields: feature_id"));
    }
}
