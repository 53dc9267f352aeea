//! Findings and Reports - The Gate's Output
//!
//! Checkers emit [`Finding`]s; the pipeline collects them into a
//! [`Report`]. Only FAIL-class findings block publication.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Severity of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Fail,
    Warn,
    Info,
    Ok,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Fail => "FAIL",
            Severity::Warn => "WARN",
            Severity::Info => "INFO",
            Severity::Ok => "OK",
        }
    }

    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Fail)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One observation tied to a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub path: PathBuf,
    pub severity: Severity,
    /// Name of the check that produced this finding.
    pub check: &'static str,
    pub message: String,
}

impl Finding {
    pub fn new(
        check: &'static str,
        path: impl Into<PathBuf>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            severity,
            check,
            message: message.into(),
        }
    }

    pub fn fail(check: &'static str, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(check, path, Severity::Fail, message)
    }

    pub fn warn(check: &'static str, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(check, path, Severity::Warn, message)
    }

    pub fn info(check: &'static str, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(check, path, Severity::Info, message)
    }

    pub fn ok(check: &'static str, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(check, path, Severity::Ok, message)
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}",
            self.path.display(),
            self.severity.label(),
            self.message
        )
    }
}

/// Ordered collection of findings from one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub findings: Vec<Finding>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn extend(&mut self, findings: Vec<Finding>) {
        self.findings.extend(findings);
    }

    pub fn has_failures(&self) -> bool {
        self.findings.iter().any(|f| f.severity.is_blocking())
    }

    /// Process exit code: non-zero iff any FAIL-class finding exists.
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }

    /// Print every finding, one per line, in emission order.
    pub fn print(&self) {
        for finding in &self.findings {
            println!("{finding}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_formats_path_level_message() {
        let f = Finding::fail("headers", "/app/doc.md", "missing header fields: version");
        assert_eq!(
            f.to_string(),
            "/app/doc.md: FAIL: missing header fields: version"
        );
    }

    #[test]
    fn exit_code_reflects_failures_only() {
        let mut report = Report::new();
        report.push(Finding::warn("leak_size", "a.md", "size large (~1100 words)"));
        report.push(Finding::info("acceptance", "b.md", "skipping mapping check"));
        report.push(Finding::ok("headers", "c.md", "header is valid"));
        assert_eq!(report.exit_code(), 0);
        assert!(!report.has_failures());

        report.push(Finding::fail("unknowns", "d.md", "UNKNOWN with High impact present"));
        assert_eq!(report.exit_code(), 1);
        assert!(report.has_failures());
    }

    #[test]
    fn counts_by_severity() {
        let mut report = Report::new();
        report.push(Finding::warn("x", "a", "w1"));
        report.push(Finding::warn("x", "b", "w2"));
        report.push(Finding::ok("x", "c", "fine"));
        assert_eq!(report.count(Severity::Warn), 2);
        assert_eq!(report.count(Severity::Ok), 1);
        assert_eq!(report.count(Severity::Fail), 0);
    }
}
