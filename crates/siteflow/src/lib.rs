//! siteflow runtime
//!
//! Runs a pipeline definition from `siteflow-core` against the providers in
//! `siteflow-cloud`: shell commands for synth and build, the approval gate,
//! stack provisioning, asset sync and cache invalidation.

pub mod approval;
pub mod error;
pub mod executor;
pub mod progress;
pub mod runner;

pub use approval::{
    ApprovalDecision, Approver, AutoApprover, InteractiveApprover, PromptReader, TerminalPrompt,
};
pub use error::{Result, RunError};
pub use executor::{CommandExecutor, ShellExecutor};
pub use runner::{
    PARAMETER_PREFIX, PipelineRunner, RunSummary, StageOutcome, lookup_hosted_zone, stack_config,
    write_templates,
};
