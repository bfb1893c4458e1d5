use crate::utils::{self, LoadedSite};
use colored::Colorize;
use siteflow_cloud::DeliveryProvider;
use siteflow_core::TemplateFormat;

pub async fn handle(
    loaded: &LoadedSite,
    approve: bool,
    skip_synth_commands: bool,
    format: TemplateFormat,
    hosted_zone_id: Option<&str>,
) -> anyhow::Result<()> {
    utils::print_loaded_site(loaded);
    println!("{}", "Running pipeline...".blue().bold());

    let provider = utils::aws_provider(loaded).await?;
    let delivery: &dyn DeliveryProvider = &*provider;
    let zone = utils::hosted_zone(loaded, Some(delivery), hosted_zone_id).await?;
    let definition = utils::define(loaded, &zone)?;
    let stage_count = definition.stages.len();

    let runner = utils::runner(loaded, definition, provider, approve)
        .with_synth_commands(!skip_synth_commands)
        .with_format(format);
    let summary = runner.run_all().await?;

    println!();
    println!(
        "{}",
        format!("{} templates synthesized", summary.templates.len()).dimmed()
    );
    for (stage, outcome) in &summary.stages {
        utils::print_outcome(*stage, outcome);
    }

    if !summary.is_success(stage_count) {
        anyhow::bail!("pipeline stopped before every stage deployed");
    }

    println!();
    println!("{}", "✓ Pipeline complete".green().bold());
    Ok(())
}
