//! Concurrency tuple: throughput, latency, error budget, and window must
//! be declared in prose and mirrored in the contract schema.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::report::Finding;

use super::{Check, CheckContext};

const NAME: &str = "concurrency";

/// Signal pairs: a topic word and the unit that must accompany it.
const SIGNAL_PAIRS: [(&str, &str); 4] = [
    ("throughput", "rps"),
    ("latency", "ms"),
    ("error budget", "%"),
    ("window", "day"),
];

/// A document counts when at least this many signal pairs appear.
const MIN_SIGNALS: usize = 3;

const SCHEMA_TUPLE_KEYS: [&str; 4] =
    ["throughput_rps", "latency_ms", "error_budget_pct", "window_days"];

const LATENCY_PERCENTILES: [&str; 3] = ["p50", "p95", "p99"];

pub struct ConcurrencyCheck;

impl Check for ConcurrencyCheck {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run(&self, ctx: &CheckContext) -> Vec<Finding> {
        let mut findings = Vec::new();
        for dir in ctx.all_feature_dirs() {
            let intent = dir.join("intent_card.md");
            let budget = dir.join("action_budget.md");
            let schema = dir.join("output_contract.schema.json");
            if intent.is_file() {
                findings.push(markdown_finding(&intent, &["concurrency targets"]));
            }
            if budget.is_file() {
                findings.push(markdown_finding(
                    &budget,
                    &["concurrency budget", "concurrency targets"],
                ));
            }
            if schema.is_file() {
                findings.push(schema_finding(&schema));
            }
        }
        findings
    }
}

/// One of the headings and at least [`MIN_SIGNALS`] signal pairs must
/// appear somewhere in the document body, case-insensitively.
fn markdown_finding(path: &Path, titles: &[&str]) -> Finding {
    let Ok(text) = fs::read_to_string(path) else {
        return Finding::warn(NAME, path, "Concurrency tuple (md) - unreadable");
    };
    let low = text.to_lowercase();
    if !titles.iter().any(|t| low.contains(&format!("## {t}"))) {
        return Finding::warn(NAME, path, "Concurrency tuple (md) - missing section");
    }
    let found = SIGNAL_PAIRS
        .iter()
        .filter(|(topic, unit)| low.contains(topic) && low.contains(unit))
        .count();
    if found >= MIN_SIGNALS {
        Finding::ok(NAME, path, "Concurrency tuple (md) - columns ok")
    } else {
        Finding::warn(NAME, path, "Concurrency tuple (md) - columns incomplete")
    }
}

/// The contract must carry a top-level `concurrency_targets` object with
/// all four tuple keys, latency broken out by percentile.
fn schema_finding(path: &Path) -> Finding {
    let value: Value = match fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|t| serde_json::from_str(&t).map_err(|e| e.to_string()))
    {
        Ok(value) => value,
        Err(e) => {
            return Finding::warn(
                NAME,
                path,
                format!("Concurrency tuple (schema) - schema unreadable: {e}"),
            );
        }
    };
    let Some(targets) = value.get("concurrency_targets").and_then(Value::as_object) else {
        return Finding::warn(
            NAME,
            path,
            "Concurrency tuple (schema) - concurrency_targets missing",
        );
    };
    let missing: Vec<&str> = SCHEMA_TUPLE_KEYS
        .iter()
        .copied()
        .filter(|k| !targets.contains_key(*k))
        .collect();
    if !missing.is_empty() {
        return Finding::warn(
            NAME,
            path,
            format!("Concurrency tuple (schema) - missing keys: {missing:?}"),
        );
    }
    let percentiles_ok = targets
        .get("latency_ms")
        .and_then(Value::as_object)
        .map_or(false, |lat| {
            LATENCY_PERCENTILES.iter().all(|p| lat.contains_key(*p))
        });
    if !percentiles_ok {
        return Finding::warn(
            NAME,
            path,
            "Concurrency tuple (schema) - latency_ms missing p50/p95/p99",
        );
    }
    Finding::ok(NAME, path, "Concurrency tuple (schema) - ok")
}
