use anyhow::{Context, Result};
use clap::Parser;
use diagnostics::*;
use hospitalized::{FetchContext, HttpFetcher, Sources, load_sources};
use std::path::PathBuf;

/// Fetch hospitalization datasets and write the derived CSV files
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory receiving the CSV files
    #[arg(long, default_value = "html")]
    output_dir: PathBuf,

    /// YAML file replacing the built-in source definitions
    #[arg(long)]
    sources: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_diagnostics();
    let args = Args::parse();

    let sources = match &args.sources {
        Some(path) => load_sources(path)
            .with_context(|| format!("Failed to load sources from: {}", path.display()))?,
        None => Sources::default(),
    };

    let context = FetchContext::new(Box::new(HttpFetcher::new()), sources, &args.output_dir);
    let outputs = context.run().await.context("Hospitalization data run failed")?;

    info!(
        "Hospitalization data written, see {hospitalized}",
        hospitalized: outputs.hospitalized.display().to_string(),
    );
    Ok(())
}
