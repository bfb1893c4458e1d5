//! Deployment-stage composer
//!
//! Binds one registry entry to its hosting unit (and compute unit when
//! enabled) with the derived domains.

use crate::compute::ComputeUnit;
use crate::error::{Result, SiteError};
use crate::hosting::SiteHostingUnit;
use crate::model::{HostedZone, SiteConfig, StageDescriptor};
use serde::{Deserialize, Serialize};

/// Domain served by a stage: the apex for production, `{stage}.{apex}` otherwise
pub fn stage_domain(descriptor: &StageDescriptor, apex_domain: &str) -> String {
    if descriptor.is_production {
        apex_domain.to_string()
    } else {
        format!("{}.{}", descriptor.stage_name, apex_domain)
    }
}

/// Domain of the stage's compute API
pub fn api_domain(descriptor: &StageDescriptor, apex_domain: &str) -> String {
    format!("api.ecs.{}.{}", descriptor.stage_name, apex_domain)
}

/// A composed stage, created once at definition time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployableStage {
    pub descriptor: StageDescriptor,

    pub domain: String,

    pub api_domain: String,

    pub hosting: SiteHostingUnit,

    pub compute: Option<ComputeUnit>,
}

impl DeployableStage {
    pub fn bucket_name(&self) -> &str {
        &self.hosting.bucket_name
    }
}

pub fn compose(
    config: &SiteConfig,
    descriptor: &StageDescriptor,
    hosted_zone: &HostedZone,
) -> Result<DeployableStage> {
    let bucket_name = descriptor
        .assets_location_name
        .clone()
        .ok_or_else(|| SiteError::MissingAssetsLocation(descriptor.stage_name.to_string()))?;

    let domain = stage_domain(descriptor, &config.apex_domain);
    let api_domain = api_domain(descriptor, &config.apex_domain);

    tracing::debug!(
        stage = %descriptor.stage_name,
        domain = %domain,
        bucket = %bucket_name,
        "composing stage"
    );

    let hosting = SiteHostingUnit {
        application: config.application.clone(),
        stage: descriptor.stage_name,
        environment: descriptor.target_environment.clone(),
        domain: domain.clone(),
        apex_domain: config.apex_domain.clone(),
        hosted_zone: hosted_zone.clone(),
        bucket_name,
        certificate_export: config.certificate_export(),
        edge_rewrite: config.edge_rewrite,
    };

    let compute = descriptor.compute.then(|| ComputeUnit {
        application: config.application.clone(),
        stage: descriptor.stage_name,
        environment: descriptor.target_environment.clone(),
        api_domain: api_domain.clone(),
    });

    Ok(DeployableStage {
        descriptor: descriptor.clone(),
        domain,
        api_domain,
        hosting,
        compute,
    })
}
