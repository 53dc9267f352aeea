//! Validation Pipeline - Single Entry Point
//!
//! Publication and packaging MUST run this pipeline. No bypass.

use log::debug;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

use crate::checks::acceptance::AcceptanceCheck;
use crate::checks::concurrency::ConcurrencyCheck;
use crate::checks::creation_run::CreationRunCheck;
use crate::checks::headers::HeadersCheck;
use crate::checks::implementable::ImplementableCheck;
use crate::checks::leak_size::LeakSizeCheck;
use crate::checks::manual_tests::ManualTestsCheck;
use crate::checks::registry::RegistryCheck;
use crate::checks::unknowns::UnknownsCheck;
use crate::checks::{Check, CheckContext};
use crate::report::Report;

#[cfg(feature = "test-hooks")]
static PIPELINE_RUN_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_pipeline_run_count() -> u32 {
    PIPELINE_RUN_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_pipeline_run_count() {
    PIPELINE_RUN_COUNT.store(0, Ordering::SeqCst);
}

/// Fixed battery of gate checkers, run in registration order.
pub struct ValidationPipeline {
    checks: Vec<Box<dyn Check>>,
}

impl ValidationPipeline {
    pub fn new() -> Self {
        Self {
            checks: vec![
                Box::new(HeadersCheck),
                Box::new(RegistryCheck),
                Box::new(AcceptanceCheck),
                Box::new(ConcurrencyCheck),
                Box::new(CreationRunCheck),
                Box::new(ImplementableCheck),
                Box::new(LeakSizeCheck),
                Box::new(ManualTestsCheck),
                Box::new(UnknownsCheck),
            ],
        }
    }

    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Run every checker over the tree described by `ctx` and collect
    /// findings in emission order.
    pub fn run(&self, ctx: &CheckContext) -> Report {
        #[cfg(feature = "test-hooks")]
        PIPELINE_RUN_COUNT.fetch_add(1, Ordering::SeqCst);

        let mut report = Report::new();
        for check in &self.checks {
            let findings = check.run(ctx);
            debug!("check {} produced {} findings", check.name(), findings.len());
            report.extend(findings);
        }
        report
    }
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::new()
    }
}
