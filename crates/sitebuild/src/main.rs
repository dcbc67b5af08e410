// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use diagnostics::*;
use sitebuild::{BuildContext, load_site_config};
use std::path::PathBuf;

/// Render the dashboard pages into the output directory
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Page configuration
    #[arg(long, default_value = "data/charts.yml")]
    config: PathBuf,

    /// Directory holding the `*.tera` templates and Markdown content
    #[arg(long, default_value = "templates")]
    templates: PathBuf,

    /// Directory receiving the HTML pages
    #[arg(long, default_value = "html")]
    output_dir: PathBuf,

    /// Markdown page to render, relative to the templates directory
    #[arg(long = "markdown", default_values_t = vec!["explanation.md".to_string()])]
    markdown: Vec<String>,
}

fn main() -> Result<()> {
    init_diagnostics();
    let args = Args::parse();

    let config = load_site_config(&args.config)
        .with_context(|| format!("Failed to load page config: {}", args.config.display()))?;
    let context = BuildContext::new(&args.templates, config, &args.output_dir, Local::now())
        .with_context(|| format!("Failed to load templates from: {}", args.templates.display()))?;

    let markdown: Vec<PathBuf> = args.markdown.iter().map(|m| args.templates.join(m)).collect();
    let summary = context.build(&markdown).context("Site build failed")?;

    info!(
        "Wrote {pages} pages to {output}",
        pages: summary.pages.len(),
        output: args.output_dir.display().to_string(),
    );
    Ok(())
}
