//! Capsule CLI - Scaffold, Validate, Publish
//!
//! Commands: new, validate, package, bump, wizard, info
//! Findings go to stdout, one per line
//! Returns non-zero on validation failure

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use semver::Version;
use uuid::Uuid;

use capsule_engine::checks::unknowns::list_unknowns;
use capsule_engine::contract::{apply_change, BumpKind, ContractError, VersionChange};
use capsule_engine::package::{package_feature, PackageError};
use capsule_engine::render::{render_template, RenderError, TokenMap};
use capsule_engine::wizard::{is_kebab_case, run_wizard, WizardOutcome};
use capsule_engine::{
    parse, CheckContext, ConfigError, DeployError, Deployer, Layout, ProjectConfig,
    ValidationPipeline, DEFAULT_FEATURE_VERSION, ENGINE_VERSION,
};

const UNKNOWN_TABLE_HEADER: &str =
    "ID | Question | Possible Effects | Recommended Actions | Next Step | Impact (High/Moderate/Low)";

#[derive(Parser)]
#[command(name = "capsule-cli")]
#[command(about = "Capsule Engine - governed feature scaffolding with a transactional publish gate")]
#[command(version = ENGINE_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// App root containing capsule.project.toml
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a feature and publish it through the validation gate
    New {
        /// Feature identifier (kebab-case)
        #[arg(long)]
        feature_id: String,

        /// Template directory; defaults to the project feature template
        #[arg(long)]
        from_template: Option<PathBuf>,

        /// Initial document version
        #[arg(long, default_value = DEFAULT_FEATURE_VERSION)]
        version: String,

        /// Updated date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<String>,

        /// Show destinations without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Replace existing destinations
        #[arg(long)]
        force: bool,
    },

    /// Run the validation pipeline and print findings
    Validate {
        /// Restrict to one feature
        #[arg(long)]
        feature_id: Option<String>,

        /// Check a single document's header
        #[arg(long)]
        doc: Option<PathBuf>,

        /// Enforce the full required-documents contract
        #[arg(long)]
        require_implementable: bool,

        /// List UNKNOWN rows instead of validating
        #[arg(long)]
        list_unknowns: bool,
    },

    /// Validate and copy a feature into the final docs tree
    Package {
        /// Feature identifier
        #[arg(long)]
        feature_id: String,

        /// Permit documents over the hard size budget
        #[arg(long, value_parser = ["yes", "no"], default_value = "no")]
        allow_gt_1600: String,
    },

    /// Bump or set the output contract version
    Bump {
        /// Feature identifier
        #[arg(long)]
        feature_id: String,

        /// SemVer component to bump
        #[arg(long, value_enum, conflicts_with = "set_version")]
        bump: Option<BumpArg>,

        /// Explicit version instead of a bump
        #[arg(long)]
        set_version: Option<String>,

        /// CHANGELOG note
        #[arg(long, default_value = "Schema evolution")]
        note: String,

        /// Run the validation pipeline afterwards
        #[arg(long)]
        run_validate: bool,
    },

    /// Interactive scaffolding
    Wizard,

    /// Show the resolved project layout
    Info,
}

#[derive(Clone, Copy, ValueEnum)]
enum BumpArg {
    Patch,
    Minor,
    Major,
}

impl From<BumpArg> for BumpKind {
    fn from(arg: BumpArg) -> Self {
        match arg {
            BumpArg::Patch => BumpKind::Patch,
            BumpArg::Minor => BumpKind::Minor,
            BumpArg::Major => BumpKind::Major,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let layout = match load_layout(&cli.root) {
        Ok(layout) => layout,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Commands::New {
            feature_id,
            from_template,
            version,
            date,
            dry_run,
            force,
        } => cmd_new(&layout, NewArgs {
            feature_id,
            from_template,
            version,
            date,
            dry_run,
            force,
        }),
        Commands::Validate {
            feature_id,
            doc,
            require_implementable,
            list_unknowns,
        } => cmd_validate(&layout, feature_id, doc, require_implementable, list_unknowns),
        Commands::Package {
            feature_id,
            allow_gt_1600,
        } => cmd_package(&layout, &feature_id, allow_gt_1600 == "yes"),
        Commands::Bump {
            feature_id,
            bump,
            set_version,
            note,
            run_validate,
        } => cmd_bump(&layout, &feature_id, bump, set_version, &note, run_validate),
        Commands::Wizard => cmd_wizard(&layout),
        Commands::Info => cmd_info(&layout),
    }
}

fn load_layout(root: &Path) -> Result<Layout, ConfigError> {
    let config = ProjectConfig::load(root)?;
    Ok(Layout::resolve(root, &config))
}

/// Pipeline context with the leak patterns loaded at the boundary.
fn build_context(layout: &Layout) -> CheckContext {
    let mut ctx = CheckContext::new(layout.clone());
    ctx.extra_leak_patterns = load_extra_patterns(layout);
    ctx
}

fn load_extra_patterns(layout: &Layout) -> Vec<String> {
    let Ok(text) = fs::read_to_string(layout.forbidden_patterns_path()) else {
        return Vec::new();
    };
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

struct NewArgs {
    feature_id: String,
    from_template: Option<PathBuf>,
    version: String,
    date: Option<String>,
    dry_run: bool,
    force: bool,
}

fn cmd_new(layout: &Layout, args: NewArgs) -> ExitCode {
    if !is_kebab_case(&args.feature_id) {
        eprintln!("ERROR: feature id must be kebab-case: {}", args.feature_id);
        return ExitCode::FAILURE;
    }
    let Ok(version) = Version::parse(&args.version) else {
        eprintln!("ERROR: invalid version '{}' (semver)", args.version);
        return ExitCode::FAILURE;
    };
    let date = args
        .date
        .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());
    if !parse::is_valid_updated(&date) {
        eprintln!("ERROR: invalid date '{date}' (YYYY-MM-DD)");
        return ExitCode::FAILURE;
    }
    let template_dir = match args.from_template {
        Some(p) if p.is_absolute() => p,
        Some(p) => layout.app_root.join(p),
        None => layout.default_template_dir(),
    };
    if !template_dir.is_dir() {
        eprintln!("ERROR: template not found: {}", template_dir.display());
        return ExitCode::from(2);
    }

    println!("== New Feature ==");
    println!("Feature ID: {}", args.feature_id);
    println!("Template:   {}", template_dir.display());
    println!("Namespace:  {}", layout.namespace);
    println!("Dest(caps): {}", layout.capsule_dir(&args.feature_id).display());
    println!("Dest(feat): {}", layout.feature_dir(&args.feature_id).display());

    if args.dry_run {
        println!("DRY-RUN: would render, validate, and copy to destinations");
        return ExitCode::SUCCESS;
    }

    publish(
        layout,
        &template_dir,
        &args.feature_id,
        &layout.namespace,
        &version,
        &date,
        args.force,
    )
}

fn publish(
    layout: &Layout,
    template_dir: &Path,
    feature_id: &str,
    namespace: &str,
    version: &Version,
    date: &str,
    force: bool,
) -> ExitCode {
    let staging = layout
        .app_root
        .join(".capsule-stage")
        .join(Uuid::new_v4().to_string());
    let tokens = TokenMap::new(feature_id, namespace, version, date);

    let rendered = match render_template(template_dir, &staging, &tokens) {
        Ok(rendered) => rendered,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            eprintln!("ERROR: {e}");
            return match e {
                RenderError::TemplateMissing(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            };
        }
    };

    let mut ctx = build_context(layout);
    ctx.feature_id = Some(feature_id.to_string());
    let outcome = Deployer::new().publish(&ctx, &rendered, feature_id, force);
    let _ = fs::remove_dir_all(&staging);

    match outcome {
        Ok(_) => {
            println!("Published '{feature_id}'.");
            ExitCode::SUCCESS
        }
        Err(DeployError::Conflict) => {
            eprintln!("ERROR: destination exists; use --force to overwrite");
            ExitCode::from(2)
        }
        Err(DeployError::ValidationFailed { code }) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_validate(
    layout: &Layout,
    feature_id: Option<String>,
    doc: Option<PathBuf>,
    require_implementable: bool,
    unknowns_only: bool,
) -> ExitCode {
    let mut ctx = build_context(layout);
    ctx.feature_id = feature_id;
    ctx.doc_path = doc;
    ctx.require_implementable = require_implementable;

    if unknowns_only {
        let listing = list_unknowns(&ctx);
        if listing.is_empty() {
            println!("No UNKNOWN rows recorded.");
            return ExitCode::SUCCESS;
        }
        for (path, rows) in listing {
            println!("File: {}", path.display());
            println!("{UNKNOWN_TABLE_HEADER}");
            for row in rows {
                println!("{}", row.raw);
            }
            println!();
        }
        return ExitCode::SUCCESS;
    }

    let report = ValidationPipeline::new().run(&ctx);
    report.print();
    let code = report.exit_code();
    if code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(code as u8)
    }
}

fn cmd_package(layout: &Layout, feature_id: &str, allow_oversize: bool) -> ExitCode {
    let mut ctx = build_context(layout);
    ctx.feature_id = Some(feature_id.to_string());
    ctx.allow_oversize = allow_oversize;

    match package_feature(&ctx, feature_id) {
        Ok(outcome) => {
            println!("Packaged '{feature_id}' -> {}", outcome.dest.display());
            println!("Bundle hash: {}", outcome.manifest.bundle_hash);
            ExitCode::SUCCESS
        }
        Err(PackageError::FeatureMissing(path)) => {
            eprintln!("ERROR: feature folder missing: {}", path.display());
            ExitCode::from(2)
        }
        Err(PackageError::ValidationFailed { code }) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_bump(
    layout: &Layout,
    feature_id: &str,
    bump: Option<BumpArg>,
    set_version: Option<String>,
    note: &str,
    run_validate: bool,
) -> ExitCode {
    let change = match set_version {
        Some(v) => VersionChange::Set(v),
        None => VersionChange::Bump(bump.map(BumpKind::from).unwrap_or(BumpKind::Patch)),
    };

    let outcome = match apply_change(&layout.feature_dir(feature_id), &change, note) {
        Ok(outcome) => outcome,
        Err(ContractError::Missing(path)) => {
            eprintln!("ERROR: contract not found: {}", path.display());
            return ExitCode::from(2);
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!(
        "Updated schema version: {} -> {}",
        outcome.previous, outcome.version
    );
    if let Some(id) = outcome.id {
        println!("$id: {id}");
    }

    if run_validate {
        let mut ctx = build_context(layout);
        ctx.feature_id = Some(feature_id.to_string());
        let report = ValidationPipeline::new().run(&ctx);
        report.print();
        let code = report.exit_code();
        if code != 0 {
            // Informational: the bump itself succeeded.
            println!("Validator exited with code {code}");
        }
    }
    ExitCode::SUCCESS
}

fn cmd_wizard(layout: &Layout) -> ExitCode {
    match run_wizard(layout) {
        Ok(WizardOutcome::Proceed(settings)) => {
            if settings.dry_run {
                println!("DRY-RUN: would render, validate, and copy to destinations");
                return ExitCode::SUCCESS;
            }
            let Ok(version) = Version::parse(&settings.version) else {
                eprintln!("ERROR: invalid version '{}' (semver)", settings.version);
                return ExitCode::FAILURE;
            };
            publish(
                layout,
                &settings.template_dir,
                &settings.feature_id,
                &settings.namespace,
                &version,
                &settings.date,
                settings.force,
            )
        }
        Ok(WizardOutcome::Aborted) => ExitCode::FAILURE,
        Ok(WizardOutcome::TemplateMissing(path)) => {
            eprintln!("ERROR: template not found: {}", path.display());
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_info(layout: &Layout) -> ExitCode {
    println!("Capsule Engine {ENGINE_VERSION}");
    println!("Root:        {}", layout.app_root.display());
    println!("Namespace:   {}", layout.namespace);
    println!("Capsule:     {}", layout.capsule_root.display());
    println!("Features:    {}", layout.features_root.display());
    println!("Final docs:  {}", layout.final_docs_root.display());
    println!("Planning:    {}", layout.planning_root.display());
    println!("Registry:    {}", layout.registry_path().display());
    println!("Template:    {}", layout.default_template_dir().display());
    ExitCode::SUCCESS
}
