//! Transactional Deployer - Atomic Swap With Total Rollback
//!
//! Publication never mutates a live tree in place. Rendered content is
//! staged in `.__new` siblings, swapped in by rename with the previous
//! tree parked in `.__old`, and only committed once validation passes.
//! Every entry reconciles leftovers of an interrupted run: a backup
//! without a live tree is the uncommitted remains of a crash and is
//! restored, never deleted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;

use crate::checks::CheckContext;
use crate::config::Layout;
use crate::fsops;
use crate::pipeline::ValidationPipeline;
use crate::render::RenderedTree;
use crate::report::Report;

const STAGED_SUFFIX: &str = ".__new";
const BACKUP_SUFFIX: &str = ".__old";

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("destination exists; use --force to overwrite")]
    Conflict,

    #[error("validation failed (exit {code})")]
    ValidationFailed { code: i32 },

    #[error("deploy failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Transaction lifecycle. Terminal states are `Committed` and
/// `RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Staged,
    Swapped,
    Committed,
    RolledBack,
}

/// Destination paths for one side of a publish.
#[derive(Debug, Clone)]
struct SidePlan {
    live: PathBuf,
    staged: PathBuf,
    backup: PathBuf,
}

impl SidePlan {
    fn new(live: PathBuf) -> Self {
        Self {
            staged: with_suffix(&live, STAGED_SUFFIX),
            backup: with_suffix(&live, BACKUP_SUFFIX),
            live,
        }
    }
}

/// Both destination sides of a feature publish: the capsule doc set and
/// the features workspace.
#[derive(Debug, Clone)]
pub struct DeployPlan {
    pub feature_id: String,
    sides: [SidePlan; 2],
}

impl DeployPlan {
    pub fn new(layout: &Layout, feature_id: &str) -> Self {
        Self {
            feature_id: feature_id.to_string(),
            sides: [
                SidePlan::new(layout.capsule_dir(feature_id)),
                SidePlan::new(layout.feature_dir(feature_id)),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SideOutcome {
    published: bool,
    backed_up: bool,
}

/// One staged-swap publish. Methods follow the state machine strictly;
/// calling them out of order is a programming error.
pub struct PublishTransaction {
    plan: DeployPlan,
    state: TxState,
    outcomes: [SideOutcome; 2],
}

impl PublishTransaction {
    /// Open a transaction, reconciling any leftovers first. A `.__old`
    /// backup whose live tree is missing marks an interrupted rollback
    /// or swap; the backup is renamed back into place. Stale `.__new`
    /// staging and backups shadowed by a live tree are removed.
    pub fn begin(plan: DeployPlan) -> Result<Self, DeployError> {
        for side in &plan.sides {
            if side.backup.exists() && !side.live.exists() {
                info!(
                    "restoring interrupted publish: {} -> {}",
                    side.backup.display(),
                    side.live.display()
                );
                rename(&side.backup, &side.live)?;
            } else {
                remove_tree(&side.backup)?;
            }
            remove_tree(&side.staged)?;
        }
        Ok(Self {
            plan,
            state: TxState::Idle,
            outcomes: [SideOutcome::default(); 2],
        })
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Copy the rendered sides into `.__new` staging. Nothing live is
    /// touched; a failure here leaves destinations exactly as found.
    pub fn stage(&mut self, rendered: &RenderedTree) -> Result<(), DeployError> {
        debug_assert_eq!(self.state, TxState::Idle);
        let sources = [&rendered.capsule_dir, &rendered.features_dir];
        for (side, source) in self.plan.sides.iter().zip(sources) {
            let Some(src) = source else {
                continue;
            };
            if let Some(parent) = side.staged.parent() {
                fs::create_dir_all(parent).map_err(|source| DeployError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fsops::copy_tree(src, &side.staged).map_err(|source| DeployError::Io {
                path: side.staged.clone(),
                source,
            })?;
            debug!("staged {}", side.staged.display());
        }
        self.state = TxState::Staged;
        Ok(())
    }

    /// Publish the staged trees. With a conflict and no `force`, the
    /// staging is discarded and the transaction ends rolled back. The
    /// previous live tree of each published side is parked in `.__old`.
    pub fn swap(&mut self, force: bool) -> Result<(), DeployError> {
        debug_assert_eq!(self.state, TxState::Staged);
        let conflict = self
            .plan
            .sides
            .iter()
            .any(|side| side.staged.exists() && side.live.exists());
        if conflict && !force {
            for side in &self.plan.sides {
                remove_tree(&side.staged)?;
            }
            self.state = TxState::RolledBack;
            return Err(DeployError::Conflict);
        }

        for (side, outcome) in self.plan.sides.iter().zip(self.outcomes.iter_mut()) {
            if !side.staged.exists() {
                continue;
            }
            if side.live.exists() {
                rename(&side.live, &side.backup)?;
                outcome.backed_up = true;
            }
            rename(&side.staged, &side.live)?;
            outcome.published = true;
            debug!("swapped in {}", side.live.display());
        }
        self.state = TxState::Swapped;
        Ok(())
    }

    /// Keep the published trees and drop the backups.
    pub fn commit(&mut self) -> Result<(), DeployError> {
        debug_assert_eq!(self.state, TxState::Swapped);
        for side in &self.plan.sides {
            remove_tree(&side.backup)?;
        }
        self.state = TxState::Committed;
        info!("publish committed for {}", self.plan.feature_id);
        Ok(())
    }

    /// Undo the swap completely: published trees are removed and any
    /// parked backup is renamed back, byte for byte.
    pub fn rollback(&mut self) -> Result<(), DeployError> {
        debug_assert_eq!(self.state, TxState::Swapped);
        for (side, outcome) in self.plan.sides.iter().zip(self.outcomes) {
            if !outcome.published {
                continue;
            }
            remove_tree(&side.live)?;
            if outcome.backed_up {
                rename(&side.backup, &side.live)?;
            }
        }
        self.state = TxState::RolledBack;
        info!("publish rolled back for {}", self.plan.feature_id);
        Ok(())
    }
}

/// Orchestrates the full publish protocol with validation as the gate.
pub struct Deployer {
    pipeline: ValidationPipeline,
}

/// A committed publish and the report that cleared it.
#[derive(Debug)]
pub struct PublishOutcome {
    pub validation: Report,
}

impl Deployer {
    pub fn new() -> Self {
        Self {
            pipeline: ValidationPipeline::new(),
        }
    }

    /// Stage, swap, validate, then commit or roll back. Findings are
    /// printed one per line, followed by the summary verdict. The
    /// validation context decides what the gate sees; destinations come
    /// from its layout.
    pub fn publish(
        &self,
        ctx: &CheckContext,
        rendered: &RenderedTree,
        feature_id: &str,
        force: bool,
    ) -> Result<PublishOutcome, DeployError> {
        let plan = DeployPlan::new(&ctx.layout, feature_id);
        let mut tx = PublishTransaction::begin(plan)?;
        tx.stage(rendered)?;
        tx.swap(force)?;

        let report = self.pipeline.run(ctx);
        report.print();
        if report.has_failures() {
            let code = report.exit_code();
            println!("Validation: FAIL (exit {code})");
            tx.rollback()?;
            return Err(DeployError::ValidationFailed { code });
        }
        println!("Validation: PASS");
        tx.commit()?;
        Ok(PublishOutcome { validation: report })
    }
}

impl Default for Deployer {
    fn default() -> Self {
        Self::new()
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn rename(from: &Path, to: &Path) -> Result<(), DeployError> {
    fs::rename(from, to).map_err(|source| DeployError::Io {
        path: from.to_path_buf(),
        source,
    })
}

fn remove_tree(path: &Path) -> Result<(), DeployError> {
    fsops::remove_dir_if_exists(path).map_err(|source| DeployError::Io {
        path: path.to_path_buf(),
        source,
    })
}
