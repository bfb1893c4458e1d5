//! AWS provider implementation

use crate::aws::AwsCli;
use crate::error::AwsError;
use async_trait::async_trait;
use siteflow_cloud::{
    Action, ActionType, ApplyResult, AuthStatus, CloudError, CloudProvider, DeliveryProvider,
    HostedZoneRecord, Plan, ProviderState, StackConfig, StackSet, StackState, StackStatus,
};
use std::collections::HashMap;
use std::path::Path;

pub struct AwsProvider {
    cli: AwsCli,
}

impl AwsProvider {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            cli: AwsCli::new(region),
        }
    }

    pub fn region(&self) -> &str {
        self.cli.region()
    }

    async fn stack_state(&self, stack: &StackConfig) -> siteflow_cloud::Result<StackState> {
        let state = match self.cli.describe_stack(&stack.stack_name, &stack.region).await? {
            Some(description) => StackState::new(
                &stack.stack_name,
                &stack.region,
                StackStatus::from_cloudformation(&description.stack_status),
            )
            .with_outputs(
                description
                    .outputs
                    .into_iter()
                    .map(|o| (o.output_key, o.output_value)),
            ),
            None => StackState::new(&stack.stack_name, &stack.region, StackStatus::NotFound),
        };
        Ok(state)
    }
}

#[async_trait]
impl CloudProvider for AwsProvider {
    fn name(&self) -> &str {
        "aws"
    }

    fn display_name(&self) -> &str {
        "Amazon Web Services"
    }

    async fn check_auth(&self) -> siteflow_cloud::Result<AuthStatus> {
        match self.cli.check_auth().await {
            Ok(identity) => Ok(AuthStatus::ok(format!(
                "{} ({})",
                identity.arn, identity.account
            ))),
            Err(AwsError::CliNotFound) => Ok(AuthStatus::failed("aws CLI is not installed")),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn get_state(&self, stacks: &[StackConfig]) -> siteflow_cloud::Result<ProviderState> {
        let mut state = ProviderState::new();
        for stack in stacks {
            state.add(self.stack_state(stack).await?);
        }
        Ok(state)
    }

    async fn plan(&self, desired: &StackSet) -> siteflow_cloud::Result<Plan> {
        let mut actions = Vec::with_capacity(desired.len());

        for stack in desired.iter() {
            let existing = self
                .cli
                .describe_stack(&stack.stack_name, &stack.region)
                .await?;

            let action_type = match existing {
                None => ActionType::Create,
                Some(_) => {
                    let deployed = self
                        .cli
                        .get_template(&stack.stack_name, &stack.region)
                        .await?;
                    if deployed == stack.template {
                        ActionType::NoOp
                    } else {
                        ActionType::Update
                    }
                }
            };

            tracing::debug!(stack = %stack.stack_name, action = %action_type, "planned");

            let template = (action_type != ActionType::NoOp).then(|| stack.template.clone());
            actions.push(Action::new(
                action_type,
                &stack.stack_name,
                &stack.region,
                template,
            ));
        }

        Ok(Plan::new(actions))
    }

    async fn apply(&self, plan: &Plan) -> siteflow_cloud::Result<ApplyResult> {
        let mut result = ApplyResult::new();
        let start = std::time::Instant::now();

        for action in &plan.actions {
            let Some(template) = &action.template else {
                result.add_success(action.id.clone(), format!("{} unchanged", action.stack_name));
                continue;
            };

            tracing::info!("Deploying stack: {} ({})", action.stack_name, action.action_type);

            match self
                .cli
                .deploy_stack(&action.stack_name, &action.region, template)
                .await
            {
                Ok(()) => {
                    result.add_success(
                        action.id.clone(),
                        format!("{} {}d", action.stack_name, action.action_type),
                    );
                }
                Err(e) => {
                    result.add_failure(action.id.clone(), e.to_string());
                    // Later stacks may import from this one
                    break;
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}

#[async_trait]
impl DeliveryProvider for AwsProvider {
    async fn stack_outputs(
        &self,
        stack_name: &str,
        region: &str,
    ) -> siteflow_cloud::Result<HashMap<String, String>> {
        let description = self
            .cli
            .describe_stack(stack_name, region)
            .await?
            .ok_or_else(|| CloudError::StackNotFound(stack_name.to_string()))?;

        Ok(description
            .outputs
            .into_iter()
            .map(|o| (o.output_key, o.output_value))
            .collect())
    }

    async fn sync_assets(&self, source_dir: &Path, bucket: &str) -> siteflow_cloud::Result<()> {
        tracing::info!("Syncing {} to s3://{}", source_dir.display(), bucket);
        self.cli.s3_sync(source_dir, bucket).await?;
        Ok(())
    }

    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
    ) -> siteflow_cloud::Result<String> {
        let invalidation = self.cli.create_invalidation(distribution_id, paths).await?;
        tracing::info!(
            distribution = distribution_id,
            invalidation = %invalidation.id,
            status = %invalidation.status,
            "invalidation created"
        );
        Ok(invalidation.id)
    }

    async fn find_hosted_zone(
        &self,
        domain: &str,
    ) -> siteflow_cloud::Result<Option<HostedZoneRecord>> {
        Ok(self
            .cli
            .find_hosted_zone(domain)
            .await?
            .map(|zone| HostedZoneRecord {
                id: zone.id,
                name: zone.name,
            }))
    }

    async fn get_parameter(&self, name: &str) -> siteflow_cloud::Result<String> {
        Ok(self.cli.get_parameter(name).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_identity() {
        let provider = AwsProvider::new("us-east-1");
        assert_eq!(provider.name(), "aws");
        assert_eq!(provider.region(), "us-east-1");
    }

    #[test]
    fn test_error_mapping() {
        let err: CloudError = AwsError::CommandFailed("AccessDenied".into()).into();
        assert!(matches!(err, CloudError::CommandFailed(msg) if msg == "AccessDenied"));

        let err: CloudError = AwsError::CliNotFound.into();
        assert!(matches!(err, CloudError::AuthenticationFailed(_)));
    }
}
