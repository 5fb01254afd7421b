//! Command implementations

use std::io::Write;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::app::{AnalyzeRequest, AppContainer};
use crate::cli::args::{DetectArgs, InspectArgs};
use crate::config_initialization::AppConfig;
use crate::output;

/// Execute the inspect command
pub async fn inspect(args: &InspectArgs, config: &AppConfig, container: &dyn AppContainer) -> Result<()> {
    info!("Starting inspect operation");

    let request = AnalyzeRequest::new(args.paths.clone(), config.analyze.clone())
        .with_workers(config.workers);
    let outcome = container
        .analyze_interactor()
        .execute(request)
        .await
        .context("Failed to analyze input files")?;

    for failure in &outcome.failures {
        eprintln!("{}: {}", failure.path, failure.message);
    }

    let rendered = output::render(&outcome.reports, config.output, &config.app)
        .context("Failed to render reports")?;
    write_stdout(&rendered)?;

    info!(
        reports = outcome.reports.len(),
        failed = outcome.failures.len(),
        "Inspect operation completed"
    );
    Ok(())
}

/// Execute the detect command
pub async fn detect(args: &DetectArgs, container: &dyn AppContainer) -> Result<()> {
    let detections = container
        .detect_interactor()
        .execute(&args.paths)
        .await
        .context("Failed to list input files")?;

    let mut lines = String::new();
    let mut failed = 0;
    for detection in &detections {
        match &detection.format {
            Ok(format) => {
                lines.push_str(&format!("{}: {}\n", detection.path.display(), format.name()));
            }
            Err(error) => {
                warn!(path = %detection.path.display(), %error, "detection failed");
                eprintln!("{}: {}", detection.path.display(), error);
                failed += 1;
            }
        }
    }
    write_stdout(&lines)?;

    if detections.is_empty() {
        anyhow::bail!("No input files found");
    }
    if failed == detections.len() {
        anyhow::bail!("No file could be read ({} failed)", failed);
    }
    Ok(())
}

/// Write rendered output, ending with a newline
fn write_stdout(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes()).context("Failed to write output")?;
    if !text.is_empty() && !text.ends_with('\n') {
        stdout.write_all(b"\n").context("Failed to write output")?;
    }
    stdout.flush().context("Failed to write output")?;
    Ok(())
}
