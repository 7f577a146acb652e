mod config;
mod pipeline;
mod report;

use anyhow::Context;
use clap::Parser;
use stewards_ai::Annotator;
use stewards_store::CsvStore;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("stewards v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let store = CsvStore::new(&cli.store);

    match cli.command {
        Command::Annotate(args) => {
            let extractor = args.build_extractor()?;
            let annotator = Annotator::new(extractor, args.retry_policy());
            let summary =
                pipeline::run(&store, &annotator, &args.input.input, &args.pipeline_config())
                    .await?;
            println!("{summary}");
            for (id, state) in &summary.states {
                if *state != pipeline::DocumentState::Recorded {
                    println!("  {id}: {}", state.as_str());
                }
            }
        }
        Command::Status(args) => {
            let plan = pipeline::plan(&store, &args.input)?;
            println!("Store:             {}", store.path().display());
            println!("Candidates:        {}", plan.candidates);
            println!("Already recorded:  {}", plan.already_processed);
            println!("Pending:           {}", plan.pending.len());
            for path in &plan.pending {
                println!("  {}", pipeline::document_id(path));
            }
        }
        Command::Report => {
            let records = if store.exists() {
                store
                    .read_records()
                    .with_context(|| format!("reading {}", store.path().display()))?
            } else {
                Vec::new()
            };
            println!("{}", report::build_report(&records));
        }
    }

    Ok(())
}
