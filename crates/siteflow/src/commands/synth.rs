use crate::utils::{self, LoadedSite};
use colored::Colorize;
use siteflow_cloud::DeliveryProvider;
use siteflow_core::TemplateFormat;
use std::path::PathBuf;

pub async fn handle(
    loaded: &LoadedSite,
    out: Option<PathBuf>,
    format: TemplateFormat,
    hosted_zone_id: Option<&str>,
) -> anyhow::Result<()> {
    utils::print_loaded_site(loaded);

    let zone = match hosted_zone_id {
        Some(id) => utils::hosted_zone(loaded, None, Some(id)).await?,
        None => {
            let provider = utils::aws_provider(loaded).await?;
            let delivery: &dyn DeliveryProvider = &*provider;
            utils::hosted_zone(loaded, Some(delivery), None).await?
        }
    };
    println!("Hosted zone: {} ({})", zone.name.cyan(), zone.id);

    let definition = utils::define(loaded, &zone)?;
    let out_dir = out.unwrap_or_else(|| loaded.project_root.join(&definition.synth.output_dir));
    let written = siteflow::write_templates(&definition, &out_dir, format).await?;

    println!();
    println!("{}", format!("{} templates written:", written.len()).green());
    for path in written {
        println!("  • {}", path.display());
    }

    Ok(())
}
