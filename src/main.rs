// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use nsrewrite::cli::Cli;
use nsrewrite::{Transformer, load_rules, report};
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let loaded = load_rules(cli.rules.as_slice()).context("Failed to load rule files")?;

    let mut transformer = Transformer::new(cli.options(loaded.invert));
    transformer
        .set_rules(loaded.tables)
        .context("Rule tables are inconsistent")?;

    let input_name = cli.input_name();
    let changes = transformer
        .apply(&input_name, &cli.input, &cli.output)
        .with_context(|| {
            format!(
                "Failed to transform {} into {}",
                cli.input.display(),
                cli.output.display()
            )
        })?;

    print!("{}", report::render_text(&changes));

    if let Some(path) = &cli.report_json {
        let json = report::render_json(&changes).context("Failed to serialize report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        info!("Wrote JSON report to {}", path.display());
    }

    Ok(())
}
