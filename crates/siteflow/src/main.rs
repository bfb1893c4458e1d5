mod commands;
mod utils;

use clap::{Parser, Subcommand};
use siteflow_core::TemplateFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "siteflow")]
#[command(about = "Deliver a single-page site through dev and prod on AWS", long_about = None)]
struct Cli {
    /// Path to the site file
    #[arg(short, long, global = true, env = "SITEFLOW_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the stages defined in the site file
    Stages,
    /// Render every CloudFormation template
    Synth {
        /// Output directory (defaults to siteflow.out next to the site file)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Template format: json or yaml
        #[arg(short, long, default_value = "json")]
        format: TemplateFormat,
        /// Use this hosted zone instead of looking it up
        #[arg(long)]
        hosted_zone_id: Option<String>,
    },
    /// Show the pipeline steps for every stage
    Plan {
        /// Print the pipeline definition as JSON
        #[arg(long)]
        json: bool,
        /// Compare templates against deployed stacks
        #[arg(long)]
        diff: bool,
        /// Use this hosted zone instead of looking it up
        #[arg(long)]
        hosted_zone_id: Option<String>,
    },
    /// Deploy a single stage (the certificate must already exist)
    Deploy {
        /// Stage name (dev, prod)
        stage: String,
        /// Approve the manual gate without prompting
        #[arg(short = 'y', long)]
        approve: bool,
        /// Use this hosted zone instead of looking it up
        #[arg(long)]
        hosted_zone_id: Option<String>,
    },
    /// Run synth, the certificate and every stage in order
    Pipeline {
        /// Approve the manual gate without prompting
        #[arg(short = 'y', long)]
        approve: bool,
        /// Render templates without running the synth commands
        #[arg(long)]
        skip_synth_commands: bool,
        /// Template format: json or yaml
        #[arg(short, long, default_value = "json")]
        format: TemplateFormat,
        /// Use this hosted zone instead of looking it up
        #[arg(long)]
        hosted_zone_id: Option<String>,
    },
    /// Invalidate a stage's CDN cache
    Invalidate {
        /// Stage name (dev, prod)
        stage: String,
        /// Use this hosted zone instead of looking it up
        #[arg(long)]
        hosted_zone_id: Option<String>,
    },
    /// Show how the edge function rewrites request paths
    Rewrite {
        #[arg(required = true)]
        uris: Vec<String>,
    },
    /// Show the recorded state of every stage
    Status {
        /// Also query the deployed stacks
        #[arg(long)]
        live: bool,
    },
    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli));
    // A timed-out approval prompt leaves a blocking stdin read behind
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config;
    let load = || utils::load(config.as_deref());

    match cli.command {
        Commands::Version => {
            println!("siteflow {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Rewrite { uris } => commands::rewrite::handle(&uris),
        Commands::Stages => commands::stages::handle(&load()?)?,
        Commands::Synth {
            out,
            format,
            hosted_zone_id,
        } => commands::synth::handle(&load()?, out, format, hosted_zone_id.as_deref()).await?,
        Commands::Plan {
            json,
            diff,
            hosted_zone_id,
        } => commands::plan::handle(&load()?, json, diff, hosted_zone_id.as_deref()).await?,
        Commands::Deploy {
            stage,
            approve,
            hosted_zone_id,
        } => {
            commands::deploy::handle(&load()?, &stage, approve, hosted_zone_id.as_deref()).await?
        }
        Commands::Pipeline {
            approve,
            skip_synth_commands,
            format,
            hosted_zone_id,
        } => {
            commands::pipeline::handle(
                &load()?,
                approve,
                skip_synth_commands,
                format,
                hosted_zone_id.as_deref(),
            )
            .await?
        }
        Commands::Invalidate {
            stage,
            hosted_zone_id,
        } => commands::invalidate::handle(&load()?, &stage, hosted_zone_id.as_deref()).await?,
        Commands::Status { live } => commands::status::handle(&load()?, live).await?,
    }

    Ok(())
}
