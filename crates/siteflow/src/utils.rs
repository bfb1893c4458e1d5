use colored::Colorize;
use siteflow::{PipelineRunner, ShellExecutor, StageOutcome, lookup_hosted_zone};
use siteflow::{Approver, AutoApprover, InteractiveApprover};
use siteflow_cloud::{CloudProvider, DeliveryProvider};
use siteflow_cloud_aws::AwsProvider;
use siteflow_core::{HostedZone, PipelineDefinition, Site, StageName};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A loaded site together with where it came from
pub struct LoadedSite {
    pub site: Site,
    pub site_file: PathBuf,
    pub project_root: PathBuf,
}

impl LoadedSite {
    /// Frontend checkout, resolved against the project root
    pub fn frontend_dir(&self) -> PathBuf {
        self.project_root.join(&self.site.config.source.frontend_dir)
    }
}

pub fn load(config: Option<&Path>) -> anyhow::Result<LoadedSite> {
    let site_file = siteflow_config::find_site_file(config)?;
    let project_root = siteflow_config::project_root(&site_file);
    let site = siteflow_core::load_site(&site_file)?;

    Ok(LoadedSite {
        site,
        site_file,
        project_root,
    })
}

pub fn print_loaded_site(loaded: &LoadedSite) {
    println!(
        "📄 {} ({})",
        loaded.site_file.display().to_string().cyan(),
        loaded.site.config.application.bold()
    );
}

pub fn parse_stage(stage: &str) -> anyhow::Result<StageName> {
    Ok(stage.parse::<StageName>()?)
}

/// AWS provider for the site's region, after checking credentials
pub async fn aws_provider(loaded: &LoadedSite) -> anyhow::Result<Arc<AwsProvider>> {
    let provider = AwsProvider::new(&loaded.site.config.region);

    println!("{}", "Checking AWS credentials...".blue());
    let auth = provider.check_auth().await?;
    if !auth.authenticated {
        anyhow::bail!(
            "AWS authentication failed: {}",
            auth.error.unwrap_or_default()
        );
    }
    if let Some(account) = &auth.account_info {
        println!("  ✓ {}", account.green());
    }

    Ok(Arc::new(provider))
}

/// Hosted zone from the flag, or looked up through the provider
pub async fn hosted_zone(
    loaded: &LoadedSite,
    delivery: Option<&dyn DeliveryProvider>,
    zone_id: Option<&str>,
) -> anyhow::Result<HostedZone> {
    let apex = &loaded.site.config.apex_domain;
    match (zone_id, delivery) {
        (Some(id), _) => Ok(HostedZone::new(id, apex.as_str())),
        (None, Some(delivery)) => Ok(lookup_hosted_zone(delivery, apex, None).await?),
        (None, None) => anyhow::bail!("--hosted-zone-id is required when AWS is not available"),
    }
}

pub fn define(loaded: &LoadedSite, zone: &HostedZone) -> anyhow::Result<PipelineDefinition> {
    Ok(PipelineDefinition::define(
        &loaded.site.config,
        &loaded.site.registry,
        zone,
    )?)
}

/// Runner wired to AWS and the local shell
pub fn runner(
    loaded: &LoadedSite,
    definition: PipelineDefinition,
    provider: Arc<AwsProvider>,
    approve: bool,
) -> PipelineRunner {
    let approver: Arc<dyn Approver> = if approve {
        Arc::new(AutoApprover)
    } else {
        Arc::new(InteractiveApprover::default())
    };

    PipelineRunner::new(
        definition,
        provider.clone(),
        provider,
        Arc::new(ShellExecutor),
        approver,
        &loaded.project_root,
    )
    .with_frontend_dir(loaded.frontend_dir())
}

pub fn print_outcome(stage: StageName, outcome: &StageOutcome) {
    match outcome {
        StageOutcome::Deployed => {
            println!("  {} {}", "✓".green(), format!("{stage}: deployed").green());
        }
        StageOutcome::Rejected { reason } => {
            println!("  {} {}: rejected ({})", "⊘".yellow(), stage, reason.yellow());
        }
        StageOutcome::Failed { step, error } => {
            println!("  {} {}: failed at {}", "✗".red(), stage, step.red());
            println!("    {}", error);
        }
    }
}
