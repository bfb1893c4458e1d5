//! Provider traits
//!
//! [`CloudProvider`] provisions stacks. [`DeliveryProvider`] covers the
//! calls around them: reading outputs, pushing assets, invalidating the CDN
//! and looking up DNS and parameters.

use crate::action::{ApplyResult, Plan};
use crate::error::Result;
use crate::state::ProviderState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

/// Stack provisioning
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "aws")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Current status of the given stacks
    async fn get_state(&self, stacks: &[StackConfig]) -> Result<ProviderState>;

    /// Calculate the diff between desired and deployed stacks
    async fn plan(&self, desired: &StackSet) -> Result<Plan>;

    /// Apply the planned actions in order, stopping at the first failure
    async fn apply(&self, plan: &Plan) -> Result<ApplyResult>;
}

/// Everything a stage needs besides stack provisioning
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    /// Outputs of a deployed stack, keyed by output name
    async fn stack_outputs(&self, stack_name: &str, region: &str)
    -> Result<HashMap<String, String>>;

    /// Mirror a local directory into a bucket
    async fn sync_assets(&self, source_dir: &Path, bucket: &str) -> Result<()>;

    /// Invalidate cached paths, returning the invalidation id
    async fn create_invalidation(&self, distribution_id: &str, paths: &[String])
    -> Result<String>;

    /// Hosted zone serving a domain, if one exists
    async fn find_hosted_zone(&self, domain: &str) -> Result<Option<HostedZoneRecord>>;

    /// Plain-text value of a parameter store entry
    async fn get_parameter(&self, name: &str) -> Result<String>;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZoneRecord {
    pub id: String,
    pub name: String,
}

/// Stacks to provision, in deploy order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackSet {
    stacks: Vec<StackConfig>,
}

impl StackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stack, replacing an earlier entry with the same name in place
    pub fn add(&mut self, stack: StackConfig) {
        match self.stacks.iter_mut().find(|s| s.stack_name == stack.stack_name) {
            Some(existing) => *existing = stack,
            None => self.stacks.push(stack),
        }
    }

    pub fn get(&self, stack_name: &str) -> Option<&StackConfig> {
        self.stacks.iter().find(|s| s.stack_name == stack_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StackConfig> {
        self.stacks.iter()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn as_slice(&self) -> &[StackConfig] {
        &self.stacks
    }
}

impl FromIterator<StackConfig> for StackSet {
    fn from_iter<I: IntoIterator<Item = StackConfig>>(iter: I) -> Self {
        let mut set = StackSet::new();
        for stack in iter {
            set.add(stack);
        }
        set
    }
}

/// One stack's desired template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    pub stack_name: String,

    pub region: String,

    pub template: serde_json::Value,
}

impl StackConfig {
    pub fn new(
        stack_name: impl Into<String>,
        region: impl Into<String>,
        template: serde_json::Value,
    ) -> Self {
        Self {
            stack_name: stack_name.into(),
            region: region.into(),
            template,
        }
    }
}

/// Retry configuration for provider operations
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    pub initial_delay: Duration,

    pub max_delay: Duration,

    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based), capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let secs = (self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        if secs.is_finite() && secs >= 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            self.max_delay
        }
    }

    /// Run `op` until it succeeds or attempts are exhausted
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(operation, attempts, error = %e, "giving up");
                    return Err(e);
                }
            }
        }
    }
}
