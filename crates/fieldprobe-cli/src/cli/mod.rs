mod commands;
mod helpers;

use clap::Parser;
use fieldprobe_core::domain::ProbeError;

pub fn run_from_env() -> i32 {
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let probe_error = error.as_probe_error();
            eprintln!("{}", probe_error.diagnostic_line());
            if let Some(summary_line) = probe_error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            probe_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("fieldprobe".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "fieldprobe",
    version,
    about = "Sample simulated sensor fields and prepare detector-simulation inputs"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Sample a field or scalar quantity along the configured line profile
    Profile(commands::ProfileArgs),
    /// Merge two slice exports of the same field by nearest mesh point
    Merge(commands::MergeArgs),
    /// Generate or compare particle track lists
    #[command(subcommand)]
    Tracks(TracksCommand),
    /// Compare charge-cluster features of PixelAV runs
    #[command(subcommand)]
    Clusters(ClustersCommand),
}

#[derive(clap::Subcommand)]
enum TracksCommand {
    /// Generate helical tracks that cross the sensor plane
    Generate(commands::TrackGenerateArgs),
    /// Compare a generated track list against a PixelAV track list
    Compare(commands::TrackCompareArgs),
}

#[derive(clap::Subcommand)]
enum ClustersCommand {
    /// Compare cluster spans and charges of two PixelAV `.out` runs
    Compare(commands::ClusterCompareArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Profile(args) => commands::run_profile_command(args),
        CliCommand::Merge(args) => commands::run_merge_command(args),
        CliCommand::Tracks(TracksCommand::Generate(args)) => {
            commands::run_track_generate_command(args)
        }
        CliCommand::Tracks(TracksCommand::Compare(args)) => {
            commands::run_track_compare_command(args)
        }
        CliCommand::Clusters(ClustersCommand::Compare(args)) => {
            commands::run_cluster_compare_command(args)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(ProbeError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_probe_error(&self) -> ProbeError {
        match self {
            Self::Usage(message) => {
                ProbeError::input_validation("INPUT.CLI_USAGE", message.clone())
            }
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => ProbeError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

impl From<ProbeError> for CliError {
    fn from(error: ProbeError) -> Self {
        Self::Compute(error)
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, run};
    use fieldprobe_core::domain::{ProbeError, ProbeErrorCategory};

    #[test]
    fn help_exits_successfully() {
        assert_eq!(run(["--help"]).expect("help should succeed"), 0);
        assert_eq!(run(["tracks", "--help"]).expect("help should succeed"), 0);
        assert_eq!(
            run(["clusters", "compare", "--help"]).expect("help should succeed"),
            0
        );
    }

    #[test]
    fn unknown_subcommand_is_a_usage_error() {
        let error = run(["interpolate"]).unwrap_err();
        assert!(matches!(error, CliError::Usage(_)));
        let probe = error.as_probe_error();
        assert_eq!(probe.code(), "INPUT.CLI_USAGE");
        assert_eq!(probe.exit_code(), 2);
    }

    #[test]
    fn cluster_compare_requires_both_runs() {
        let error = run(["clusters", "compare", "--first", "a.out"]).unwrap_err();
        assert!(matches!(error, CliError::Usage(ref message) if message.contains("--second")));
    }

    #[test]
    fn compute_errors_keep_their_category() {
        let error = CliError::from(ProbeError::malformed_record(
            "PARSE.MESH_RECORD",
            "mesh.txt: line 2: expected 3 fields, found 2",
        ));
        let probe = error.as_probe_error();
        assert_eq!(probe.category(), ProbeErrorCategory::MalformedRecordError);
        assert_eq!(probe.exit_code(), 4);
    }

    #[test]
    fn internal_errors_render_their_context_chain() {
        let error = CliError::Internal(
            anyhow::anyhow!("permission denied").context("failed to resolve output directory"),
        );
        let probe = error.as_probe_error();
        assert_eq!(probe.exit_code(), 3);
        assert!(probe.message().contains("failed to resolve output directory"));
        assert!(probe.message().contains("permission denied"));
    }
}
