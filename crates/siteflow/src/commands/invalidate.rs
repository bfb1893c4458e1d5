use crate::utils::{self, LoadedSite};
use colored::Colorize;
use siteflow_cloud::DeliveryProvider;

pub async fn handle(
    loaded: &LoadedSite,
    stage: &str,
    hosted_zone_id: Option<&str>,
) -> anyhow::Result<()> {
    let stage = utils::parse_stage(stage)?;

    let provider = utils::aws_provider(loaded).await?;
    let delivery: &dyn DeliveryProvider = &*provider;
    let zone = utils::hosted_zone(loaded, Some(delivery), hosted_zone_id).await?;
    let definition = utils::define(loaded, &zone)?;

    let runner = utils::runner(loaded, definition, provider, false);
    let invalidation = runner.invalidate_stage(stage).await?;

    println!(
        "{} invalidation {} created for {}",
        "✓".green(),
        invalidation.cyan(),
        stage
    );
    Ok(())
}
