use super::CliError;
use anyhow::Context;
use fieldprobe_core::config::{ProbeConfig, load_probe_config};
use fieldprobe_core::workflows::{Workflow, WorkflowOutcome};
use std::path::{Path, PathBuf};
use tracing::debug;

pub(super) fn load_config(path: Option<&Path>) -> Result<ProbeConfig, CliError> {
    match path {
        Some(path) => {
            debug!(config = %path.display(), "loading probe config");
            load_probe_config(path).map_err(|error| CliError::Compute(error.into()))
        }
        None => Ok(ProbeConfig::default()),
    }
}

/// Relative output locations are resolved against the working directory so
/// the printed artifact paths are unambiguous.
pub(super) fn resolve_output_path(path: &Path) -> Result<PathBuf, CliError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let working_dir =
        std::env::current_dir().context("failed to read current working directory")?;
    Ok(working_dir.join(path))
}

pub(super) fn run_workflow(
    workflow: &dyn Workflow,
    config_path: Option<&Path>,
) -> Result<i32, CliError> {
    let config = load_config(config_path)?;
    println!("Running {}...", workflow.name());
    let outcome = workflow.execute(&config)?;
    print_outcome(&outcome);
    Ok(0)
}

fn print_outcome(outcome: &WorkflowOutcome) {
    for line in &outcome.summary {
        println!("{}", line);
    }
    for artifact in &outcome.artifacts {
        println!("Wrote {}", artifact.path.display());
    }
}
