//! Stage registry
//!
//! The ordered list of deployment environments. Order is deploy order and is
//! fixed in source by [`StageName::ALL`]; `site.kdl` only supplies the
//! per-stage parameters. A registry is never mutated after construction.

use crate::certificate::CERTIFICATE_REGION;
use crate::error::{Result, SiteError};
use crate::model::{SiteConfig, StageDescriptor, StageName, TargetEnvironment};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize)]
pub struct StageRegistry {
    stages: Vec<StageDescriptor>,
}

impl StageRegistry {
    /// Build a registry from descriptors, validating the topology.
    ///
    /// Stage names must be unique and exactly one stage must be production.
    pub fn new(stages: Vec<StageDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for stage in &stages {
            if !seen.insert(stage.stage_name) {
                return Err(SiteError::DuplicateStage(stage.stage_name.to_string()));
            }
        }

        let production = stages.iter().filter(|s| s.is_production).count();
        if production != 1 {
            return Err(SiteError::ProductionStageCount(production));
        }

        Ok(Self { stages })
    }

    /// The fixed dev → prod topology with parameters from the site config.
    ///
    /// Every stage must resolve to [`CERTIFICATE_REGION`]: hosting stacks
    /// import the certificate ARN, and exports only resolve within a region.
    pub fn from_config(config: &SiteConfig) -> Result<Self> {
        let mut stages = Vec::with_capacity(StageName::ALL.len());
        for &name in StageName::ALL.iter() {
            let params = config.stages.get(&name).cloned().unwrap_or_default();
            let target = TargetEnvironment::new(
                params.account.unwrap_or_else(|| config.account.clone()),
                params.region.unwrap_or_else(|| config.region.clone()),
            );
            if target.region != CERTIFICATE_REGION {
                return Err(SiteError::InvalidConfig(format!(
                    "stage {} targets region {}, but CloudFront sites must deploy to {}",
                    name, target.region, CERTIFICATE_REGION
                )));
            }

            stages.push(StageDescriptor {
                stage_name: name,
                target_environment: target,
                is_production: name.is_production(),
                assets_location_name: params.bucket,
                oauth_client_id: params.oauth_client_id,
                oauth_redirect_url: params.oauth_redirect_url,
                compute: params.compute,
                variables: params.variables,
            });
        }

        Self::new(stages)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageDescriptor> {
        self.stages.iter()
    }

    pub fn get(&self, name: StageName) -> Option<&StageDescriptor> {
        self.stages.iter().find(|s| s.stage_name == name)
    }

    pub fn production(&self) -> Option<&StageDescriptor> {
        self.stages.iter().find(|s| s.is_production)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl<'a> IntoIterator for &'a StageRegistry {
    type Item = &'a StageDescriptor;
    type IntoIter = std::slice::Iter<'a, StageDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StageParams;

    fn env() -> TargetEnvironment {
        TargetEnvironment::new("123456789012", "us-east-1")
    }

    #[test]
    fn test_from_config_is_dev_then_prod() {
        let config = SiteConfig::new("ExampleSite", "example.com", "123456789012")
            .with_stage(StageName::Prod, StageParams::with_bucket("prod-assets"))
            .with_stage(StageName::Dev, StageParams::with_bucket("dev-assets"));

        let registry = StageRegistry::from_config(&config).unwrap();
        let names: Vec<_> = registry.iter().map(|s| s.stage_name).collect();
        assert_eq!(names, vec![StageName::Dev, StageName::Prod]);

        assert_eq!(
            registry.get(StageName::Dev).unwrap().assets_location_name.as_deref(),
            Some("dev-assets")
        );
        assert_eq!(registry.production().unwrap().stage_name, StageName::Prod);
    }

    #[test]
    fn test_exactly_one_production_stage() {
        let config = SiteConfig::new("ExampleSite", "example.com", "123456789012");
        let registry = StageRegistry::from_config(&config).unwrap();
        assert_eq!(registry.iter().filter(|s| s.is_production).count(), 1);
    }

    #[test]
    fn test_stage_overrides_account() {
        let mut params = StageParams::with_bucket("dev-assets");
        params.account = Some("999999999999".to_string());
        params.region = Some("us-east-1".to_string());
        let config = SiteConfig::new("ExampleSite", "example.com", "123456789012")
            .with_stage(StageName::Dev, params);

        let registry = StageRegistry::from_config(&config).unwrap();
        let dev = registry.get(StageName::Dev).unwrap();
        assert_eq!(dev.target_environment.account, "999999999999");
        assert_eq!(dev.target_environment.region, "us-east-1");

        let prod = registry.get(StageName::Prod).unwrap();
        assert_eq!(prod.target_environment.account, "123456789012");
    }

    #[test]
    fn test_site_region_outside_certificate_region_rejected() {
        let mut config = SiteConfig::new("ExampleSite", "example.com", "123456789012");
        config.region = "eu-west-1".to_string();

        let err = StageRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, SiteError::InvalidConfig(msg) if msg.contains("eu-west-1")));
    }

    #[test]
    fn test_stage_region_override_rejected() {
        let mut params = StageParams::with_bucket("dev-assets");
        params.region = Some("eu-west-1".to_string());
        let config = SiteConfig::new("ExampleSite", "example.com", "123456789012")
            .with_stage(StageName::Dev, params);

        let err = StageRegistry::from_config(&config).unwrap_err();
        assert!(matches!(err, SiteError::InvalidConfig(msg) if msg.contains("stage dev")));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = StageRegistry::new(vec![
            StageDescriptor::new(StageName::Prod, env()),
            StageDescriptor::new(StageName::Prod, env()),
        ]);
        assert!(matches!(result, Err(SiteError::DuplicateStage(_))));
    }

    #[test]
    fn test_missing_production_rejected() {
        let result = StageRegistry::new(vec![StageDescriptor::new(StageName::Dev, env())]);
        assert!(matches!(result, Err(SiteError::ProductionStageCount(0))));
    }

    #[test]
    fn test_two_production_stages_rejected() {
        let mut dev = StageDescriptor::new(StageName::Dev, env());
        dev.is_production = true;
        let result = StageRegistry::new(vec![dev, StageDescriptor::new(StageName::Prod, env())]);
        assert!(matches!(result, Err(SiteError::ProductionStageCount(2))));
    }
}
