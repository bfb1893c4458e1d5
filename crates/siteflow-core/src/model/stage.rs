//! Stage identity and per-stage descriptor

use crate::error::SiteError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Deployment environment name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Dev,
    Prod,
}

impl StageName {
    /// Deploy order. Dev ships first so defects surface before production.
    pub const ALL: [StageName; 2] = [StageName::Dev, StageName::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Dev => "dev",
            StageName::Prod => "prod",
        }
    }

    /// Whether this stage is the production stage in the fixed topology.
    pub fn is_production(&self) -> bool {
        matches!(self, StageName::Prod)
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageName {
    type Err = SiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(StageName::Dev),
            "prod" => Ok(StageName::Prod),
            other => Err(SiteError::UnknownStage(other.to_string())),
        }
    }
}

/// Account and region where a stage's resources live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEnvironment {
    pub account: String,
    pub region: String,
}

impl TargetEnvironment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }
}

/// Identity and parameters for one deployment environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub stage_name: StageName,

    pub target_environment: TargetEnvironment,

    pub is_production: bool,

    /// Bucket holding this stage's static assets
    pub assets_location_name: Option<String>,

    /// Identity provider client id injected at build time
    pub oauth_client_id: Option<String>,

    /// Identity provider redirect URL injected at build time
    pub oauth_redirect_url: Option<String>,

    /// Whether the companion compute (Lambda + API Gateway) stack is deployed
    #[serde(default)]
    pub compute: bool,

    /// Extra build-time environment values
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl StageDescriptor {
    pub fn new(stage_name: StageName, target_environment: TargetEnvironment) -> Self {
        Self {
            stage_name,
            target_environment,
            is_production: stage_name.is_production(),
            assets_location_name: None,
            oauth_client_id: None,
            oauth_redirect_url: None,
            compute: false,
            variables: BTreeMap::new(),
        }
    }
}
