//! Unknowns policy: open questions are tracked, complete, and never
//! High-impact at publish time.

use std::path::PathBuf;

use crate::parse::{extract_unknown_rows, UnknownRow};
use crate::report::Finding;

use super::{markdown_files, read_doc, Check, CheckContext};

const NAME: &str = "unknowns";

pub struct UnknownsCheck;

impl Check for UnknownsCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run(&self, ctx: &CheckContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        for dir in ctx.features_side_dirs() {
            for doc in markdown_files(&dir) {
                let text = match read_doc(NAME, &doc) {
                    Ok(text) => text,
                    Err(finding) => {
                        findings.push(finding);
                        continue;
                    }
                };
                for row in extract_unknown_rows(&text) {
                    if !row.is_complete() {
                        findings.push(Finding::fail(
                            NAME,
                            &doc,
                            format!("UNKNOWN row malformed: {}", row.raw),
                        ));
                    } else if row.is_high_impact() {
                        findings.push(Finding::fail(
                            NAME,
                            &doc,
                            "UNKNOWN with High impact present",
                        ));
                    }
                }
            }
        }
        findings
    }
}

/// All UNKNOWN rows across both sides, for the `--list-unknowns` view.
/// Only documents carrying at least one row are returned.
pub fn list_unknowns(ctx: &CheckContext) -> Vec<(PathBuf, Vec<UnknownRow>)> {
    let mut listing = Vec::new();
    for dir in ctx.all_feature_dirs() {
        for doc in markdown_files(&dir) {
            let Ok(text) = std::fs::read_to_string(&doc) else {
                continue;
            };
            let rows = extract_unknown_rows(&text);
            if !rows.is_empty() {
                listing.push((doc, rows));
            }
        }
    }
    listing
}
