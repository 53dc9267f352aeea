//! Acceptance mapping: the intent card's checklist must cover every
//! required key of the output contract.

use std::collections::BTreeSet;
use std::fs;

use serde_json::Value;

use crate::report::Finding;

use super::{read_doc, Check, CheckContext};

const NAME: &str = "acceptance";

pub struct AcceptanceCheck;

impl Check for AcceptanceCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run(&self, ctx: &CheckContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        for dir in ctx.all_feature_dirs() {
            let intent = dir.join("intent_card.md");
            let schema = dir.join("output_contract.schema.json");
            if !intent.is_file() || !schema.is_file() {
                continue;
            }

            let schema_value: Value = match fs::read_to_string(&schema)
                .map_err(|e| e.to_string())
                .and_then(|t| serde_json::from_str(&t).map_err(|e| e.to_string()))
            {
                Ok(value) => value,
                Err(_) => {
                    findings.push(Finding::fail(
                        NAME,
                        &schema,
                        "output_contract.schema.json is not valid JSON",
                    ));
                    continue;
                }
            };
            let required = required_keys(&schema_value);
            if required.is_empty() {
                findings.push(Finding::info(
                    NAME,
                    &intent,
                    "output_contract required[] empty; skipping mapping check",
                ));
                continue;
            }

            let text = match read_doc(NAME, &intent) {
                Ok(text) => text,
                Err(finding) => {
                    findings.push(finding);
                    continue;
                }
            };
            let mapped = mapped_keys(&text);
            let missing: Vec<&String> = required.iter().filter(|k| !mapped.contains(*k)).collect();
            if missing.is_empty() {
                findings.push(Finding::ok(
                    NAME,
                    &intent,
                    "acceptance→schema mapping covers required keys",
                ));
            } else {
                findings.push(Finding::warn(
                    NAME,
                    &intent,
                    format!("acceptance→schema mapping missing keys: {missing:?}"),
                ));
            }
        }
        findings
    }
}

fn required_keys(schema: &Value) -> BTreeSet<String> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Schema keys mapped by the checklist table: rows following a heading
/// that mentions both "checklist" and "schema", until the first blank or
/// pipe-free line. The mapped key is the second cell, backticks stripped.
fn mapped_keys(text: &str) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    let mut in_table = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if !in_table {
            let lower = trimmed.to_lowercase();
            if lower.starts_with("checklist") && lower.contains("schema") {
                in_table = true;
            }
            continue;
        }
        if trimmed.is_empty() || !trimmed.contains('|') {
            break;
        }
        let cells: Vec<&str> = trimmed
            .split('|')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        if let Some(key) = cells.get(1) {
            let key = key.trim_matches(['`', ' ']);
            if !key.is_empty() && !key.chars().all(|c| c == '-') {
                keys.insert(key.to_string());
            }
        }
    }
    keys
}
