use crate::utils::{self, LoadedSite};
use colored::Colorize;
use siteflow_cloud::DeliveryProvider;

pub async fn handle(
    loaded: &LoadedSite,
    stage: &str,
    approve: bool,
    hosted_zone_id: Option<&str>,
) -> anyhow::Result<()> {
    let stage = utils::parse_stage(stage)?;
    utils::print_loaded_site(loaded);
    println!("{}", format!("Deploying stage {stage}...").blue().bold());

    let provider = utils::aws_provider(loaded).await?;
    let delivery: &dyn DeliveryProvider = &*provider;
    let zone = utils::hosted_zone(loaded, Some(delivery), hosted_zone_id).await?;
    let definition = utils::define(loaded, &zone)?;

    let runner = utils::runner(loaded, definition, provider, approve);
    let outcome = runner.deploy_stage(stage).await?;

    println!();
    utils::print_outcome(stage, &outcome);
    if !outcome.is_deployed() {
        anyhow::bail!("stage {stage} did not deploy");
    }
    Ok(())
}
