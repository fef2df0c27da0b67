//! Run report rendering.

use crate::core::{PipelineRun, ResultKind, StageOutcome};
use crate::errors::ProvisionError;
use crate::pipeline::RunOutcome;
use crate::provision::OutputFormat;
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Serialize)]
struct JsonReport<'a> {
    outcome: StageOutcome,
    exit_code: i32,
    error: Option<String>,
    #[serde(flatten)]
    run: &'a PipelineRun,
}

/// Renders the run as JSON.
pub fn render_json(outcome: &RunOutcome) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        outcome: outcome.outcome(),
        exit_code: outcome.exit_code(),
        error: outcome.error.as_ref().map(ToString::to_string),
        run: &outcome.run,
    })
}

fn marker(outcome: StageOutcome) -> &'static str {
    match outcome {
        StageOutcome::Success => "ok",
        StageOutcome::Failed => "FAILED",
        StageOutcome::Skipped => "skipped",
    }
}

/// Renders one line per recorded result, then a summary.
#[must_use]
pub fn render_human(outcome: &RunOutcome) -> String {
    let run = &outcome.run;
    let mut out = String::new();
    let _ = writeln!(out, "{} {} (run {})", run.pipeline, run.unit, run.run_id);

    for result in run.results() {
        let indent = if result.group.is_some() { "    " } else { "  " };
        let label = match result.kind {
            ResultKind::Group => format!("[{}]", result.name),
            _ => result.name.clone(),
        };
        let _ = write!(out, "{indent}{label:<18} {:<8}", marker(result.outcome));
        if let Some(error) = &result.error {
            let _ = write!(out, " {error}");
        } else if let Some(reason) = &result.skip_reason {
            let _ = write!(out, " ({reason})");
        } else if result.kind != ResultKind::Gate {
            let _ = write!(out, " {}ms", result.duration_ms());
        }
        out.push('\n');
    }

    let (ok, failed, skipped) = run.counts();
    let _ = writeln!(
        out,
        "{}: {ok} ok, {failed} failed, {skipped} skipped",
        marker(outcome.outcome())
    );
    if let Some(error) = &outcome.error {
        let _ = writeln!(out, "error: {error}");
    }
    out
}

/// Prints the run report to stdout.
pub fn print(outcome: &RunOutcome, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Human => print!("{}", render_human(outcome)),
        OutputFormat::Json => println!("{}", render_json(outcome)?),
    }
    Ok(())
}

/// Prints an error that stopped the run before any stage ran.
pub fn print_rejection(error: &ProvisionError) {
    eprintln!("Error: {error}");
    if let ProvisionError::Configuration(config) = error {
        if let Some(hint) = &config.fix_hint {
            eprintln!("Hint: {hint}");
        }
    }
}
