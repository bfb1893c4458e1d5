//! Manual approval gate
//!
//! The only step that waits on a human. A gate that times out or cannot
//! prompt counts as a rejection.

use async_trait::async_trait;
use colored::Colorize;
use siteflow_core::{ApprovalStep, StageName};
use std::io::{BufRead, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected(String),
}

#[async_trait]
pub trait Approver: Send + Sync {
    async fn request(&self, stage: StageName, step: &ApprovalStep) -> ApprovalDecision;
}

/// Approves every gate (`--approve`)
#[derive(Debug, Default, Clone)]
pub struct AutoApprover;

#[async_trait]
impl Approver for AutoApprover {
    async fn request(&self, stage: StageName, _step: &ApprovalStep) -> ApprovalDecision {
        tracing::info!(%stage, "approval granted automatically");
        ApprovalDecision::Approved
    }
}

/// Blocking source of the reviewer's answer
pub trait PromptReader: Send + Sync + 'static {
    /// Whether a reviewer can be asked at all
    fn is_interactive(&self) -> bool;

    /// Show the prompt and block until a line is read.
    fn read_answer(&self, prompt: &str) -> std::io::Result<String>;
}

/// Prompts on stdout and reads stdin
#[derive(Debug, Default, Clone)]
pub struct TerminalPrompt;

impl PromptReader for TerminalPrompt {
    fn is_interactive(&self) -> bool {
        std::io::stdin().is_terminal()
    }

    fn read_answer(&self, prompt: &str) -> std::io::Result<String> {
        print!("{prompt}");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

/// Asks a reviewer, by default on the terminal.
///
/// The read runs on a blocking thread that cannot be cancelled; after a
/// timeout it stays parked until the runtime is shut down in the background.
#[derive(Clone)]
pub struct InteractiveApprover {
    reader: Arc<dyn PromptReader>,
    timeout: Option<Duration>,
}

impl Default for InteractiveApprover {
    fn default() -> Self {
        Self::new(TerminalPrompt)
    }
}

impl InteractiveApprover {
    pub fn new(reader: impl PromptReader) -> Self {
        Self {
            reader: Arc::new(reader),
            timeout: None,
        }
    }

    /// Override the step's `timeout_minutes`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Approver for InteractiveApprover {
    async fn request(&self, stage: StageName, step: &ApprovalStep) -> ApprovalDecision {
        if !self.reader.is_interactive() {
            return ApprovalDecision::Rejected(
                "approval required but stdin is not a terminal (pass --approve)".to_string(),
            );
        }

        let prompt = format!(
            "{}\n{} [y/N] ",
            step.comment.yellow(),
            format!("Deploy to {stage}?").bold()
        );
        let reader = Arc::clone(&self.reader);
        let answer = tokio::task::spawn_blocking(move || reader.read_answer(&prompt));

        let timeout = self
            .timeout
            .unwrap_or_else(|| Duration::from_secs(step.timeout_minutes.saturating_mul(60)));
        match tokio::time::timeout(timeout, answer).await {
            Ok(Ok(Ok(line))) => parse_answer(&line),
            Ok(Ok(Err(e))) => ApprovalDecision::Rejected(format!("failed to read answer: {e}")),
            Ok(Err(e)) => ApprovalDecision::Rejected(format!("approval prompt aborted: {e}")),
            Err(_) => {
                tracing::warn!(%stage, ?timeout, "approval timed out");
                ApprovalDecision::Rejected(format!("no answer within {timeout:?}"))
            }
        }
    }
}

fn parse_answer(line: &str) -> ApprovalDecision {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => ApprovalDecision::Approved,
        _ => ApprovalDecision::Rejected("rejected by reviewer".to_string()),
    }
}
