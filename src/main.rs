mod aggregator;
mod config;
mod dates;
mod loader;
mod model;
mod normalizer;
mod report;
mod severity;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Args, PipelineConfig};
use crate::model::{PipelineError, RecordSource};
use crate::report::Report;

/// Loader → normalizer → aggregator, once, over a single file.
pub fn run_pipeline(
    config: &PipelineConfig,
    source: &dyn RecordSource,
) -> Result<Report, PipelineError> {
    let (rows, info) = loader::load(&config.input, source)?;
    let normalized = normalizer::normalize(&rows, &config.expected_type)?;
    info!(
        "{} records kept, {} duplicates, {} of another type",
        normalized.records.len(),
        normalized.duplicates,
        normalized.rejected.len()
    );

    Ok(report::build_report(&normalized, info, config))
}

/// Diagnostics go to stderr so stdout carries only the report.
fn setup_logging() {
    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(EnvFilter::new("info"))
        .with(layer)
        .init();
}

fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::from(Args::parse());
    setup_logging();
    info!("reading {} assessments from {}", config.expected_type, config.input.display());

    let report = run_pipeline(&config, &loader::CsvSource::new())
        .with_context(|| format!("processing {}", config.input.display()))?;

    let json = serde_json::to_string_pretty(&report).context("serializing report")?;
    println!("{}", json);
    Ok(())
}
