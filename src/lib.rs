//! Capsule Engine - Feature Capsule Scaffolding and Publication
//!
//! # The Five Laws (Non-Negotiable)
//! 1. Headers Are Contracts
//! 2. Validation Gates Publication
//! 3. Swaps Are Atomic, Rollback Is Total
//! 4. Backups Never Outlive A Transaction
//! 5. Checkers Read, Never Write

pub mod checks;
pub mod config;
pub mod contract;
pub mod deploy;
mod fsops;
pub mod hashing;
pub mod package;
pub mod parse;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod wizard;

pub use checks::{Check, CheckContext};
pub use config::{ConfigError, Layout, ProjectConfig};
pub use contract::{BumpKind, ContractError, VersionChange};
pub use deploy::{DeployError, Deployer, PublishOutcome, TxState};
pub use pipeline::ValidationPipeline;
pub use render::{RenderError, RenderedTree, TokenMap};
pub use report::{Finding, Report, Severity};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DEFAULT_FEATURE_VERSION: &str = "0.1.0";
