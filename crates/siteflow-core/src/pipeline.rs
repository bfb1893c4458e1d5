//! Pipeline definition
//!
//! The immutable description of what a run does: sources, synth, the shared
//! certificate and the ordered steps of every stage. Execution lives in the
//! `siteflow` crate's runner.

use crate::certificate::CertificateUnit;
use crate::cfn::StackTemplate;
use crate::composer::{DeployableStage, compose};
use crate::error::Result;
use crate::hosting::DISTRIBUTION_ID_OUTPUT;
use crate::model::{HostedZone, SiteConfig, StageName};
use crate::registry::StageRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const APPROVAL_STEP_ID: &str = "ApproveIfStable";
pub const DEFAULT_SYNTH_OUTPUT: &str = "siteflow.out";
pub const INVALIDATION_PATHS: &[&str] = &["/*"];

/// A repository the pipeline pulls from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRepository {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub connection_arn: Option<String>,
    pub trigger_on_push: bool,
}

impl SourceRepository {
    /// `owner/repo`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthStep {
    pub commands: Vec<String>,
    /// Directory rendered templates are written to
    pub output_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub comment: String,
    pub timeout_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    pub project_name: String,
    /// Source the build runs against (`owner/repo` of the frontend)
    pub input: String,
    pub install_commands: Vec<String>,
    pub commands: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Build output directory, relative to the frontend checkout
    pub output_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployStep {
    /// Stacks provisioned before the sync, in order
    pub stacks: Vec<String>,
    pub bucket: String,
    pub source_dir: String,
}

impl DeployStep {
    /// Sync command as it would be typed in a shell
    pub fn sync_command(&self) -> String {
        format!("aws s3 sync {} s3://{}", self.source_dir, self.bucket)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidateStep {
    /// Stack whose output holds the distribution id
    pub stack_name: String,
    pub output_key: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    ManualApproval(ApprovalStep),
    Build(BuildStep),
    Deploy(DeployStep),
    Invalidate(InvalidateStep),
}

impl StepKind {
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::ManualApproval(_) => "approval",
            StepKind::Build(_) => "build",
            StepKind::Deploy(_) => "deploy",
            StepKind::Invalidate(_) => "invalidate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(flatten)]
    pub kind: StepKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStage {
    pub stage: DeployableStage,
    pub steps: Vec<Step>,
}

impl PipelineStage {
    pub fn name(&self) -> StageName {
        self.stage.descriptor.stage_name
    }

    /// Position of the first step with the given label
    pub fn position(&self, label: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.kind.label() == label)
    }

    /// Templates this stage provisions, hosting first
    pub fn templates(&self) -> Vec<StackTemplate> {
        let mut templates = vec![self.stage.hosting.template()];
        if let Some(compute) = &self.stage.compute {
            templates.push(compute.template());
        }
        templates
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub application: String,
    /// Infra repository first, then the frontend repository
    pub sources: Vec<SourceRepository>,
    pub synth: SynthStep,
    pub certificate: CertificateUnit,
    pub stages: Vec<PipelineStage>,
}

impl PipelineDefinition {
    pub fn define(
        config: &SiteConfig,
        registry: &StageRegistry,
        hosted_zone: &HostedZone,
    ) -> Result<Self> {
        let sources = vec![
            source(config, &config.source.repo),
            source(config, &config.source.frontend_repo),
        ];
        let frontend = sources[1].full_name();

        let stages = registry
            .iter()
            .map(|descriptor| {
                let stage = compose(config, descriptor, hosted_zone)?;
                let steps = stage_steps(config, &stage, &frontend);
                Ok(PipelineStage { stage, steps })
            })
            .collect::<Result<Vec<_>>>()?;

        let buckets = stages
            .iter()
            .map(|s| s.stage.bucket_name().to_string())
            .collect();
        let certificate = CertificateUnit::new(config, hosted_zone.clone(), buckets);

        tracing::info!(
            application = %config.application,
            stages = stages.len(),
            "pipeline defined"
        );

        Ok(Self {
            application: config.application.clone(),
            sources,
            synth: SynthStep {
                commands: config.synth.commands.clone(),
                output_dir: DEFAULT_SYNTH_OUTPUT.to_string(),
            },
            certificate,
            stages,
        })
    }

    pub fn stage(&self, name: StageName) -> Option<&PipelineStage> {
        self.stages.iter().find(|s| s.name() == name)
    }

    /// Every template the pipeline provisions, certificate first
    pub fn templates(&self) -> Vec<StackTemplate> {
        let mut templates = vec![self.certificate.template()];
        for stage in &self.stages {
            templates.extend(stage.templates());
        }
        templates
    }
}

fn source(config: &SiteConfig, repo: &str) -> SourceRepository {
    SourceRepository {
        owner: config.source.owner.clone(),
        repo: repo.to_string(),
        branch: config.source.branch.clone(),
        connection_arn: config.source.connection_arn.clone(),
        trigger_on_push: true,
    }
}

fn build_env(config: &SiteConfig, stage: &DeployableStage) -> BTreeMap<String, String> {
    let descriptor = &stage.descriptor;
    let build = &config.build;

    // Stage variables first so the reserved names below always win
    let mut env = descriptor.variables.clone();
    env.insert(build.stage_var.clone(), descriptor.stage_name.to_string());
    if let Some(client_id) = &descriptor.oauth_client_id {
        env.insert(build.client_id_var.clone(), client_id.clone());
    }
    if let Some(redirect_url) = &descriptor.oauth_redirect_url {
        env.insert(build.redirect_url_var.clone(), redirect_url.clone());
    }
    env.insert("CI".to_string(), "true".to_string());
    env
}

fn stage_steps(config: &SiteConfig, stage: &DeployableStage, frontend: &str) -> Vec<Step> {
    let name = stage.descriptor.stage_name;
    let mut steps = Vec::with_capacity(4);

    if stage.descriptor.is_production {
        steps.push(Step {
            id: APPROVAL_STEP_ID.to_string(),
            kind: StepKind::ManualApproval(ApprovalStep {
                comment: config.approval.comment.clone(),
                timeout_minutes: config.approval.timeout_minutes,
            }),
        });
    }

    steps.push(Step {
        id: format!("Build-FrontEnd-{name}"),
        kind: StepKind::Build(BuildStep {
            project_name: format!("BuildProject-{name}"),
            input: frontend.to_string(),
            install_commands: config.build.install_commands.clone(),
            commands: config.build.commands.clone(),
            env: build_env(config, stage),
            output_dir: config.build.output_dir.clone(),
        }),
    });

    let mut stacks = vec![stage.hosting.stack_name()];
    if let Some(compute) = &stage.compute {
        stacks.push(compute.stack_name());
    }
    steps.push(Step {
        id: format!("Deploy-FrontEnd-{name}"),
        kind: StepKind::Deploy(DeployStep {
            stacks,
            bucket: stage.bucket_name().to_string(),
            source_dir: config.build.output_dir.clone(),
        }),
    });

    steps.push(Step {
        id: format!("InvalidateCache-{name}"),
        kind: StepKind::Invalidate(InvalidateStep {
            stack_name: stage.hosting.stack_name(),
            output_key: DISTRIBUTION_ID_OUTPUT.to_string(),
            paths: INVALIDATION_PATHS.iter().map(|p| p.to_string()).collect(),
        }),
    });

    steps
}
