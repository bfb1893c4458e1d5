//! siteflow core
//!
//! Site model, `site.kdl` parser, stage registry, CloudFormation units and
//! the pipeline definition. Nothing in this crate talks to AWS.

pub mod certificate;
pub mod cfn;
pub mod composer;
pub mod compute;
pub mod edge;
pub mod error;
pub mod hosting;
pub mod loader;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod registry;

pub use certificate::CertificateUnit;
pub use cfn::{StackTemplate, TemplateFormat};
pub use composer::{DeployableStage, api_domain, compose, stage_domain};
pub use compute::ComputeUnit;
pub use edge::{handle_event, rewrite_uri};
pub use error::{Result, SiteError};
pub use hosting::{DISTRIBUTION_ID_OUTPUT, DnsRecord, SiteHostingUnit, hosting_stack_name};
pub use loader::{Site, load_site};
pub use model::*;
pub use parser::{parse_site_file, parse_site_string};
pub use pipeline::{
    ApprovalStep, BuildStep, DeployStep, InvalidateStep, PipelineDefinition, PipelineStage,
    SourceRepository, Step, StepKind, SynthStep,
};
pub use registry::StageRegistry;
