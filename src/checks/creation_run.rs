//! Creation run log: contiguous steps, valid gates, unknowns recorded.

use crate::parse::{self, extract_creation_steps};
use crate::report::Finding;

use super::{read_doc_optional, Check, CheckContext};

const NAME: &str = "creation_run";

const MAIN_TABLE_HEADER: &str = "Step | Doc | Gate | Key decisions | Links";

pub struct CreationRunCheck;

impl Check for CreationRunCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run(&self, ctx: &CheckContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        for dir in ctx.features_side_dirs() {
            let log = dir.join("reports").join("creation_run.md");
            let text = match read_doc_optional(&log) {
                Ok(Some(text)) => text,
                // Presence is the implementable checker's concern.
                Ok(None) => continue,
                Err(e) => {
                    findings.push(Finding::fail(NAME, &log, format!("unreadable: {e}")));
                    continue;
                }
            };

            if !has_creation_run_header(&text) {
                findings.push(Finding::fail(NAME, &log, "missing or invalid header"));
            }
            if !text.contains(MAIN_TABLE_HEADER) {
                findings.push(Finding::fail(NAME, &log, "main table header missing"));
            }

            let steps = extract_creation_steps(&text);
            if steps.is_empty() {
                findings.push(Finding::warn(NAME, &log, "no steps recorded yet"));
            } else {
                let mut prev: Option<u32> = None;
                for step in &steps {
                    if let Some(p) = prev {
                        if step.step != p + 1 {
                            findings.push(Finding::fail(
                                NAME,
                                &log,
                                format!("out-of-order or missing step around {p}->{}", step.step),
                            ));
                            break;
                        }
                    }
                    if !parse::is_valid_gate(&step.gate) {
                        findings.push(Finding::fail(
                            NAME,
                            &log,
                            format!("invalid Gate value '{}' in step {}", step.gate, step.step),
                        ));
                    }
                    prev = Some(step.step);
                }
            }

            if !text.contains("## UNKNOWN Summary") {
                findings.push(Finding::warn(NAME, &log, "UNKNOWN Summary section missing"));
            }
        }
        findings
    }
}

fn has_creation_run_header(text: &str) -> bool {
    text.starts_with("feature_id:") && text.contains("\ndoc_type: governance.creation_run\n")
}
