//! Interactive Wizard - Guided Feature Scaffolding
//!
//! Collects and validates the inputs of a `new` run, shows a summary
//! with the resolved destinations, and asks for confirmation before
//! anything is rendered.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{Layout, DEFAULT_TEMPLATE_REL};
use crate::parse;
use crate::DEFAULT_FEATURE_VERSION;

static KEBAB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap());

pub fn is_kebab_case(s: &str) -> bool {
    KEBAB_RE.is_match(s)
}

/// Confirmed inputs for a scaffold run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardSettings {
    pub feature_id: String,
    pub namespace: String,
    pub version: String,
    pub date: String,
    pub template_dir: PathBuf,
    pub dry_run: bool,
    pub force: bool,
}

#[derive(Debug)]
pub enum WizardOutcome {
    Proceed(WizardSettings),
    Aborted,
    TemplateMissing(PathBuf),
}

/// Run the wizard on stdin/stdout.
pub fn run_wizard(layout: &Layout) -> io::Result<WizardOutcome> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    run_wizard_io(layout, &mut input, &mut output)
}

fn run_wizard_io<R: BufRead, W: Write>(
    layout: &Layout,
    input: &mut R,
    output: &mut W,
) -> io::Result<WizardOutcome> {
    writeln!(output, "== Feature Wizard ==")?;

    let Some(feature_id) = prompt(input, output, "Feature ID (kebab-case)", "", is_kebab_case)?
    else {
        return aborted(output);
    };
    let Some(namespace) = prompt(input, output, "Namespace", &layout.namespace, |s| {
        !s.is_empty()
    })?
    else {
        return aborted(output);
    };
    let Some(version) = prompt(input, output, "Version", DEFAULT_FEATURE_VERSION, |s| {
        parse::parse_version(s).is_some()
    })?
    else {
        return aborted(output);
    };
    let today = Local::now().format("%Y-%m-%d").to_string();
    let Some(date) = prompt(
        input,
        output,
        "Updated date (YYYY-MM-DD)",
        &today,
        parse::is_valid_updated,
    )?
    else {
        return aborted(output);
    };
    let Some(template_rel) = prompt(
        input,
        output,
        "Template path (relative to app root)",
        DEFAULT_TEMPLATE_REL,
        |s| !s.is_empty(),
    )?
    else {
        return aborted(output);
    };

    let template_dir = layout.app_root.join(&template_rel);
    if !template_dir.is_dir() {
        return Ok(WizardOutcome::TemplateMissing(template_dir));
    }

    writeln!(output)?;
    writeln!(output, "== Summary ==")?;
    writeln!(output, "Feature ID: {feature_id}")?;
    writeln!(output, "Namespace:  {namespace}")?;
    writeln!(output, "Version:    {version}")?;
    writeln!(output, "Updated:    {date}")?;
    writeln!(output, "Template:   {}", template_dir.display())?;
    writeln!(output, "Destinations:")?;
    writeln!(output, "  capsule:  {}", layout.capsule_dir(&feature_id).display())?;
    writeln!(output, "  features: {}", layout.feature_dir(&feature_id).display())?;

    let Some(dry_run) = yes_no(input, output, "Dry-run? (yes/no)", "no")? else {
        return aborted(output);
    };
    let Some(force) = yes_no(input, output, "Force overwrite if exists? (yes/no)", "no")?
    else {
        return aborted(output);
    };
    let Some(proceed) = yes_no(input, output, "Proceed? (yes/no)", "yes")? else {
        return aborted(output);
    };
    if !proceed {
        return aborted(output);
    }

    Ok(WizardOutcome::Proceed(WizardSettings {
        feature_id,
        namespace,
        version,
        date,
        template_dir,
        dry_run,
        force,
    }))
}

fn aborted<W: Write>(output: &mut W) -> io::Result<WizardOutcome> {
    writeln!(output, "Aborted.")?;
    Ok(WizardOutcome::Aborted)
}

fn yes_no<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    default: &str,
) -> io::Result<Option<bool>> {
    let answer = prompt(input, output, label, default, |s| {
        s.eq_ignore_ascii_case("yes") || s.eq_ignore_ascii_case("no")
    })?;
    Ok(answer.map(|a| a.eq_ignore_ascii_case("yes")))
}

/// Ask until the answer validates. Empty input takes the default when one
/// exists; EOF aborts.
fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    default: &str,
    validate: impl Fn(&str) -> bool,
) -> io::Result<Option<String>> {
    loop {
        if default.is_empty() {
            write!(output, "{label}: ")?;
        } else {
            write!(output, "{label} [{default}]: ")?;
        }
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let answer = line.trim();
        let candidate = if answer.is_empty() { default } else { answer };
        if validate(candidate) {
            return Ok(Some(candidate.to_string()));
        }
        writeln!(output, "Invalid value; please try again.")?;
    }
}
