//! Structural Parsing - Typed Records From Governed Text
//!
//! Every pattern the checkers rely on lives here: headers, schema
//! references, UNKNOWN rows, creation-run steps, the manual-tests table.
//! Checkers consume typed records and stay free of parsing detail.

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use thiserror::Error;

/// The five required header keys, in canonical order.
pub const HEADER_KEYS: [&str; 5] = ["feature_id", "doc_type", "schema_ref", "version", "updated"];

/// Header parsing never looks past this many lines.
pub const HEADER_SCAN_LINES: usize = 50;

/// Valid Gate values for creation-run rows.
pub const GATE_VALUES: [&str; 3] = ["PASS", "WARN", "FAIL"];

static FEATURE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*(?:-[a-z0-9]+)*(?:-v[0-9]+)?$").unwrap());

static UPDATED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static DOC_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:planning|governance|quality)\.[a-z0-9_.-]+$").unwrap());

static SCHEMA_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^urn:(?P<ns>[a-z][a-z0-9-]*):schema:capsule:(?P<fid>[a-z0-9-]+):(?P<dtype>[a-z0-9_.-]+):v(?P<major>\d+)@(?P<ver>\S+)$",
    )
    .unwrap()
});

static STEP_ROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\s*\|").unwrap());

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

static TESTS_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*ID\s*\|\s*Test Name\s*\|\s*Inputs\s*\|\s*Expected Result\s*\|\s*Linked Schema Key\s*\|\s*Status\s*$",
    )
    .unwrap()
});

static CONTRACT_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Contract:\s*(urn:[a-z][a-z0-9-]*:\S+)$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid schema_ref format: {0}")]
    SchemaRef(String),
}

pub fn is_valid_feature_id(s: &str) -> bool {
    FEATURE_ID_RE.is_match(s)
}

pub fn is_valid_updated(s: &str) -> bool {
    UPDATED_RE.is_match(s)
}

pub fn is_valid_doc_type(s: &str) -> bool {
    DOC_TYPE_RE.is_match(s)
}

pub fn is_valid_gate(s: &str) -> bool {
    GATE_VALUES.contains(&s)
}

/// Strict SemVer parse; pre-release and build metadata are allowed.
pub fn parse_version(s: &str) -> Option<Version> {
    Version::parse(s).ok()
}

/// Word-count proxy for token budgets.
pub fn word_count(text: &str) -> usize {
    WORD_RE.find_iter(text).count()
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// The ordered `key: value` preamble of a governed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: Vec<(String, String)>,
}

impl Header {
    /// Parse `key: value` pairs from the first [`HEADER_SCAN_LINES`] lines,
    /// stopping at the first blank line once at least one field was seen.
    /// Non-blank lines without a colon are skipped.
    pub fn parse(text: &str) -> Self {
        let mut fields: Vec<(String, String)> = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if i >= HEADER_SCAN_LINES {
                break;
            }
            if line.trim().is_empty() {
                if fields.is_empty() {
                    continue;
                }
                break;
            }
            if let Some((key, value)) = line.split_once(':') {
                fields.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Required keys absent from the parsed fields, in canonical order.
    pub fn missing_required(&self) -> Vec<&'static str> {
        HEADER_KEYS
            .iter()
            .copied()
            .filter(|k| self.get(k).is_none())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Keys of the first five non-blank lines, for the canonical-order rule.
/// A line without a colon contributes its whole trimmed text as the key.
pub fn leading_keys(text: &str) -> Vec<String> {
    let mut keys = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = match trimmed.split_once(':') {
            Some((k, _)) => k.trim(),
            None => trimmed,
        };
        keys.push(key.to_string());
        if keys.len() == HEADER_KEYS.len() {
            break;
        }
    }
    keys
}

/// A document is governed when any of its first [`HEADER_SCAN_LINES`] lines
/// mentions a `doc_type:` field.
pub fn is_governed(text: &str) -> bool {
    text.lines()
        .take(HEADER_SCAN_LINES)
        .any(|line| line.contains("doc_type:"))
}

// ---------------------------------------------------------------------------
// SchemaRef
// ---------------------------------------------------------------------------

/// Parsed `urn:<ns>:schema:capsule:<fid>:<dtype>:v<major>@<version>` binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRef {
    pub namespace: String,
    pub feature_id: String,
    pub doc_type: String,
    pub major: u64,
    pub version: String,
}

impl SchemaRef {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let caps = SCHEMA_REF_RE
            .captures(s)
            .ok_or_else(|| ParseError::SchemaRef(s.to_string()))?;
        Ok(Self {
            namespace: caps["ns"].to_string(),
            feature_id: caps["fid"].to_string(),
            doc_type: caps["dtype"].to_string(),
            // The grammar guarantees digits; saturate rather than panic on
            // absurd widths.
            major: caps["major"].parse().unwrap_or(u64::MAX),
            version: caps["ver"].to_string(),
        })
    }

    /// Whether the `v<major>` segment agrees with the embedded version's
    /// SemVer MAJOR component. Unparseable versions are reported elsewhere.
    pub fn major_matches_version(&self) -> Option<bool> {
        parse_version(&self.version).map(|v| v.major == self.major)
    }
}

impl std::str::FromStr for SchemaRef {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// UNKNOWN rows
// ---------------------------------------------------------------------------

/// One row recorded under a document's "## UNKNOWN Summary" heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRow {
    /// Raw row text as it appeared in the document.
    pub raw: String,
    /// Non-empty trimmed cells.
    pub cells: Vec<String>,
}

impl UnknownRow {
    /// Rows need the full 6 columns: id, question, possible effects,
    /// recommended actions, next step, impact.
    pub fn is_complete(&self) -> bool {
        self.cells.len() >= 6
    }

    pub fn impact(&self) -> Option<&str> {
        self.cells.last().map(|s| s.as_str())
    }

    pub fn is_high_impact(&self) -> bool {
        self.impact()
            .map(|i| i.to_lowercase().starts_with("high"))
            .unwrap_or(false)
    }
}

/// Extract UNKNOWN rows from the section between a `## UNKNOWN Summary`
/// heading and the next `## ` heading (or end of text). Table header lines
/// (`id | ...`) are dropped.
pub fn extract_unknown_rows(text: &str) -> Vec<UnknownRow> {
    let mut rows = Vec::new();
    let mut in_section = false;
    for line in text.lines() {
        if line.trim_end() == "## UNKNOWN Summary" {
            in_section = true;
            continue;
        }
        if in_section {
            if line.starts_with("## ") {
                break;
            }
            let trimmed = line.trim();
            if !trimmed.contains('|') || is_separator_row(trimmed) {
                continue;
            }
            if trimmed.to_lowercase().starts_with("id |") {
                continue;
            }
            rows.push(UnknownRow {
                raw: trimmed.to_string(),
                cells: split_cells(trimmed),
            });
        }
    }
    rows
}

// ---------------------------------------------------------------------------
// Creation-run steps
// ---------------------------------------------------------------------------

/// One `step | doc | gate | ...` row of a creation run log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationRunStep {
    pub step: u32,
    pub doc: String,
    pub gate: String,
}

/// Extract step rows: lines starting with a step number and a pipe. The
/// first three columns are kept; short rows are dropped.
pub fn extract_creation_steps(text: &str) -> Vec<CreationRunStep> {
    let mut steps = Vec::new();
    for line in text.lines() {
        if !STEP_ROW_RE.is_match(line) {
            continue;
        }
        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        if parts.len() < 3 {
            continue;
        }
        let Ok(step) = parts[0].parse::<u32>() else {
            continue;
        };
        steps.push(CreationRunStep {
            step,
            doc: parts[1].to_string(),
            gate: parts[2].to_string(),
        });
    }
    steps
}

// ---------------------------------------------------------------------------
// Manual-tests table
// ---------------------------------------------------------------------------

/// One row of the fixed 6-column manual tests table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualTestRow {
    pub id: String,
    pub name: String,
    pub inputs: String,
    pub expected: String,
    pub linked_schema_key: String,
    pub status: String,
}

impl ManualTestRow {
    /// Linked key with surrounding backticks and spaces stripped.
    pub fn linked_key(&self) -> String {
        self.linked_schema_key.trim_matches(['`', ' ']).to_string()
    }
}

/// Parse the table under the "## Tests" heading: rows after the fixed
/// header line, stopping at the next `## ` heading. Separator lines and
/// rows with fewer than six non-empty cells are dropped (best-effort scan).
pub fn parse_tests_table(text: &str) -> Vec<ManualTestRow> {
    let mut rows = Vec::new();
    let mut in_tests = false;
    let mut seen_header = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.to_lowercase().starts_with("## tests") {
            in_tests = true;
            continue;
        }
        if !in_tests {
            continue;
        }
        if trimmed.starts_with("## ") {
            break;
        }
        if !seen_header {
            if TESTS_HEADER_RE.is_match(trimmed) {
                seen_header = true;
            }
            continue;
        }
        if trimmed.is_empty() || !trimmed.contains('|') || is_separator_row(trimmed) {
            continue;
        }
        let cells = split_cells(trimmed);
        if cells.len() >= 6 {
            rows.push(ManualTestRow {
                id: cells[0].clone(),
                name: cells[1].clone(),
                inputs: cells[2].clone(),
                expected: cells[3].clone(),
                linked_schema_key: cells[4].clone(),
                status: cells[5].clone(),
            });
        }
    }
    rows
}

/// Find the `Contract: urn:...@<version>` reference line, if any.
pub fn extract_contract_ref(text: &str) -> Option<String> {
    CONTRACT_REF_RE
        .captures(text)
        .map(|caps| caps[1].to_string())
}

fn is_separator_row(line: &str) -> bool {
    line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

// ---------------------------------------------------------------------------
// Cell helpers
// ---------------------------------------------------------------------------

/// Split a table row on `|`, trimming cells and dropping empty ones.
pub fn split_cells(line: &str) -> Vec<String> {
    line.split('|')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}
