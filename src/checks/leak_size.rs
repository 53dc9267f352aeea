//! Leak and size guard: published docs must not smell like prompt
//! scaffolding and must stay within token budgets.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::parse::word_count;
use crate::report::Finding;

use super::{markdown_files, read_doc, Check, CheckContext};

const NAME: &str = "leak_size";

// 800 and 1600 token budgets at ~1.35 words per token.
const SOFT_WORD_LIMIT: usize = 1080;
const HARD_WORD_LIMIT: usize = 2160;

static BUILTIN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\bYou are an? (?:autonomous|AI|model)\b",
        r"(?i)^Purpose\b",
        r"(?i)^Template\b",
        r"(?i)You are generating scaffolding documents only",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub struct LeakSizeCheck;

impl Check for LeakSizeCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run(&self, ctx: &CheckContext) -> Vec<Finding> {
        let mut patterns: Vec<Regex> = BUILTIN_PATTERNS.clone();
        for raw in &ctx.extra_leak_patterns {
            // Supplied patterns match case-insensitively, like the builtins.
            match RegexBuilder::new(raw).case_insensitive(true).build() {
                Ok(re) => patterns.push(re),
                Err(e) => log::warn!("skipping invalid leak pattern {raw:?}: {e}"),
            }
        }

        let mut findings = Vec::new();
        for dir in ctx.all_feature_dirs() {
            for doc in markdown_files(&dir) {
                let text = match read_doc(NAME, &doc) {
                    Ok(text) => text,
                    Err(finding) => {
                        findings.push(finding);
                        continue;
                    }
                };
                for pattern in &patterns {
                    if pattern.is_match(&text) {
                        findings.push(Finding::fail(NAME, &doc, "possible prompt leakage"));
                        break;
                    }
                }
                let words = word_count(&text);
                if words > HARD_WORD_LIMIT {
                    if ctx.allow_oversize {
                        findings.push(Finding::warn(
                            NAME,
                            &doc,
                            format!("size very large (~{words} words), allowed by override"),
                        ));
                    } else {
                        findings.push(Finding::fail(
                            NAME,
                            &doc,
                            format!("size very large (~{words} words)"),
                        ));
                    }
                } else if words > SOFT_WORD_LIMIT {
                    findings.push(Finding::warn(
                        NAME,
                        &doc,
                        format!("size large (~{words} words)"),
                    ));
                }
            }
        }
        findings
    }
}
