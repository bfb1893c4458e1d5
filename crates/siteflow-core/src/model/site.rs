//! Site-wide configuration
//!
//! Loaded once from `site.kdl` before anything else runs and passed by
//! reference to every component. Nothing reads it from ambient state.

use super::stage::StageName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_APPROVAL_COMMENT: &str =
    "Approve to continue production deployment. Make sure every change is verified in dev.";
pub const DEFAULT_APPROVAL_TIMEOUT_MINUTES: u64 = 60;

/// Top-level site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Application name used in stack, export and resource names
    pub application: String,

    /// Apex domain (e.g. "example.com")
    pub apex_domain: String,

    /// AWS account id
    pub account: String,

    /// Default region for stage stacks
    pub region: String,

    /// Attach the SPA rewrite function to each distribution
    pub edge_rewrite: bool,

    pub source: SourceConfig,

    pub synth: SynthConfig,

    pub build: BuildConfig,

    pub approval: ApprovalConfig,

    /// Per-stage parameters keyed by stage
    pub stages: BTreeMap<StageName, StageParams>,
}

impl SiteConfig {
    pub fn new(
        application: impl Into<String>,
        apex_domain: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            application: application.into(),
            apex_domain: apex_domain.into(),
            account: account.into(),
            region: DEFAULT_REGION.to_string(),
            edge_rewrite: false,
            source: SourceConfig::default(),
            synth: SynthConfig::default(),
            build: BuildConfig::default(),
            approval: ApprovalConfig::default(),
            stages: BTreeMap::new(),
        }
    }

    pub fn with_stage(mut self, stage: StageName, params: StageParams) -> Self {
        self.stages.insert(stage, params);
        self
    }

    /// Export name of the shared certificate ARN
    pub fn certificate_export(&self) -> String {
        format!("{}-certificate", self.application)
    }
}

/// Source repositories the pipeline pulls from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// CodeStar connection ARN used for both repositories
    pub connection_arn: Option<String>,
    pub owner: String,
    /// Repository holding this site definition
    pub repo: String,
    /// Repository holding the frontend application
    pub frontend_repo: String,
    pub branch: String,
    /// Local checkout of the frontend repository
    pub frontend_dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            connection_arn: None,
            owner: String::new(),
            repo: String::new(),
            frontend_repo: String::new(),
            branch: DEFAULT_BRANCH.to_string(),
            frontend_dir: PathBuf::from("../frontend"),
        }
    }
}

/// Commands run before templates are rendered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthConfig {
    pub commands: Vec<String>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            commands: vec!["npm ci".to_string(), "npm run build".to_string()],
        }
    }
}

/// Frontend build settings shared by every stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    pub install_commands: Vec<String>,
    pub commands: Vec<String>,
    /// Build output directory, relative to the frontend checkout
    pub output_dir: String,
    pub stage_var: String,
    pub client_id_var: String,
    pub redirect_url_var: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            install_commands: vec!["npm install".to_string()],
            commands: vec!["npm run build".to_string()],
            output_dir: "dist".to_string(),
            stage_var: "REACT_APP_STAGE".to_string(),
            client_id_var: "VITE_GOOGLE_OAUTH_CLIENT_ID".to_string(),
            redirect_url_var: "VITE_GOOGLE_OAUTH_REDIRECT_URL".to_string(),
        }
    }
}

/// Manual approval gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    pub comment: String,
    /// Waiting longer than this counts as a rejection
    pub timeout_minutes: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            comment: DEFAULT_APPROVAL_COMMENT.to_string(),
            timeout_minutes: DEFAULT_APPROVAL_TIMEOUT_MINUTES,
        }
    }
}

/// Stage parameters as written in `site.kdl`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageParams {
    pub bucket: Option<String>,
    pub oauth_client_id: Option<String>,
    pub oauth_redirect_url: Option<String>,
    /// Overrides the site-wide account
    pub account: Option<String>,
    /// Overrides the site-wide region
    pub region: Option<String>,
    pub compute: bool,
    pub variables: BTreeMap<String, String>,
}

impl StageParams {
    pub fn with_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: Some(bucket.into()),
            ..Default::default()
        }
    }
}

/// Route53 hosted zone for the apex domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    /// Zone id without the `/hostedzone/` prefix
    pub id: String,
    pub name: String,
}

impl HostedZone {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        let id = id.trim_start_matches("/hostedzone/").to_string();
        Self {
            id,
            name: name.into().trim_end_matches('.').to_string(),
        }
    }
}
