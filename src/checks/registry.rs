//! Registry and prompt-template consistency: every registered doc_type
//! has a prompt file, every prompt template on disk is registered.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::parse;
use crate::report::Finding;

use super::{Check, CheckContext};

const NAME: &str = "registry";

/// Registered paths that are legitimately not `*_template.md` prompts.
const ALLOWED_NON_TEMPLATES: [&str; 1] = ["prompts/final_bundle_verifier.md"];

pub struct RegistryCheck;

impl Check for RegistryCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run(&self, ctx: &CheckContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        let registry_path = ctx.layout.registry_path();

        let text = match fs::read_to_string(&registry_path) {
            Ok(text) => text,
            Err(_) => {
                findings.push(Finding::fail(NAME, &registry_path, "registry not found"));
                return findings;
            }
        };
        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                findings.push(Finding::fail(
                    NAME,
                    &registry_path,
                    format!("registry is not valid JSON: {e}"),
                ));
                return findings;
            }
        };
        let Some(entries) = value.as_object() else {
            findings.push(Finding::fail(
                NAME,
                &registry_path,
                "registry is not a JSON object",
            ));
            return findings;
        };

        let mut registered: BTreeSet<String> = BTreeSet::new();
        for (doc_type, entry) in entries {
            if !parse::is_valid_doc_type(doc_type) {
                findings.push(Finding::fail(
                    NAME,
                    &registry_path,
                    format!("invalid doc_type namespace: {doc_type}"),
                ));
            }
            let Some(rel) = entry.as_str() else {
                findings.push(Finding::fail(
                    NAME,
                    &registry_path,
                    format!("invalid registry entry for {doc_type}"),
                ));
                continue;
            };
            if !ctx.layout.app_root.join(rel).exists() {
                findings.push(Finding::fail(
                    NAME,
                    &registry_path,
                    format!("missing template file for {doc_type}: {rel}"),
                ));
            }
            registered.insert(rel.to_string());
        }

        let present = prompt_templates(&ctx.layout.prompts_dir, &ctx.layout.app_root);
        for rel in present.difference(&registered) {
            findings.push(Finding::fail(
                NAME,
                &registry_path,
                format!("template present but not in registry: {rel}"),
            ));
        }
        for rel in registered.difference(&present) {
            if ALLOWED_NON_TEMPLATES.contains(&rel.as_str()) {
                continue;
            }
            findings.push(Finding::fail(
                NAME,
                &registry_path,
                format!("registry references non-template file: {rel}"),
            ));
        }

        if findings.is_empty() {
            findings.push(Finding::ok(
                NAME,
                &registry_path,
                "registry and templates are consistent",
            ));
        }
        findings
    }
}

/// `*_template.md` files directly under the prompts dir, as paths
/// relative to the app root.
fn prompt_templates(prompts_dir: &Path, app_root: &Path) -> BTreeSet<String> {
    let Ok(entries) = fs::read_dir(prompts_dir) else {
        return BTreeSet::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with("_template.md"))
                    .unwrap_or(false)
        })
        .filter_map(|p| {
            p.strip_prefix(app_root)
                .ok()
                .map(|rel| rel.to_string_lossy().into_owned())
        })
        .collect()
}
