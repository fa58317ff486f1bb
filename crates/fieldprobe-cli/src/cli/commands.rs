use super::CliError;
use super::helpers::{resolve_output_path, run_workflow};
use fieldprobe_core::workflows::clusters::{ClusterCompareRequest, DEFAULT_CLUSTER_COMPARISON_NAME};
use fieldprobe_core::workflows::merge::MergeRequest;
use fieldprobe_core::workflows::profile::{ProfileQuantity, ProfileRequest};
use fieldprobe_core::workflows::tracks::{
    DEFAULT_COMPARISON_NAME, DEFAULT_TRACK_LIST_NAME, TrackCompareRequest, TrackGenerateRequest,
};
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct ConfigFlag {
    /// JSON run configuration; built-in detector defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum QuantityArg {
    /// One vector file; the profile holds its magnitude
    Field,
    /// One or more scalar files sampled side by side
    Scalar,
}

impl From<QuantityArg> for ProfileQuantity {
    fn from(quantity: QuantityArg) -> Self {
        match quantity {
            QuantityArg::Field => Self::FieldMagnitude,
            QuantityArg::Scalar => Self::Scalar,
        }
    }
}

#[derive(clap::Args)]
pub(super) struct ProfileArgs {
    /// Mesh coordinates, one `x y z` per line
    #[arg(long)]
    mesh: PathBuf,

    /// Value files aligned with the mesh rows
    #[arg(long = "values", required = true, num_args = 1..)]
    values: Vec<PathBuf>,

    /// Kind of values being profiled
    #[arg(long, value_enum, default_value_t = QuantityArg::Field)]
    quantity: QuantityArg,

    /// Directory for the profile CSV
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// File name overriding the one derived from the profile anchor
    #[arg(long)]
    output_name: Option<String>,

    #[command(flatten)]
    config: ConfigFlag,
}

#[derive(clap::Args)]
pub(super) struct MergeArgs {
    /// Slice export whose points are kept (`x y z vx vy vz`)
    #[arg(long)]
    query: PathBuf,

    /// Slice export providing the out-of-plane component
    #[arg(long)]
    reference: PathBuf,

    /// Directory for the combined table and quality report
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    #[command(flatten)]
    config: ConfigFlag,
}

#[derive(clap::Args)]
pub(super) struct TrackGenerateArgs {
    /// Number of sensor hits to produce
    #[arg(long, default_value_t = 1000)]
    count: usize,

    /// Random seed overriding the configured one
    #[arg(long)]
    seed: Option<u64>,

    /// Output track list
    #[arg(long, default_value = DEFAULT_TRACK_LIST_NAME)]
    output: PathBuf,

    #[command(flatten)]
    config: ConfigFlag,
}

#[derive(clap::Args)]
pub(super) struct TrackCompareArgs {
    /// Track list written by `tracks generate`
    #[arg(long)]
    generated: PathBuf,

    /// PixelAV track list (`cotb cota p flp localx localy pT`)
    #[arg(long)]
    pixelav: PathBuf,

    /// JSON comparison report
    #[arg(long, default_value = DEFAULT_COMPARISON_NAME)]
    output: PathBuf,

    #[command(flatten)]
    config: ConfigFlag,
}

#[derive(clap::Args)]
pub(super) struct ClusterCompareArgs {
    /// PixelAV `.out` run whose spans are the minuend of the deltas
    #[arg(long)]
    first: PathBuf,

    /// PixelAV `.out` run of the same configuration
    #[arg(long)]
    second: PathBuf,

    /// JSON comparison report
    #[arg(long, default_value = DEFAULT_CLUSTER_COMPARISON_NAME)]
    output: PathBuf,

    #[command(flatten)]
    config: ConfigFlag,
}

pub(super) fn run_profile_command(args: ProfileArgs) -> Result<i32, CliError> {
    let request = ProfileRequest {
        mesh_path: args.mesh,
        value_paths: args.values,
        quantity: args.quantity.into(),
        output_dir: resolve_output_path(&args.output_dir)?,
        output_name: args.output_name,
    };
    run_workflow(&request, args.config.config.as_deref())
}

pub(super) fn run_merge_command(args: MergeArgs) -> Result<i32, CliError> {
    let request = MergeRequest {
        query_table: args.query,
        reference_table: args.reference,
        output_dir: resolve_output_path(&args.output_dir)?,
    };
    run_workflow(&request, args.config.config.as_deref())
}

pub(super) fn run_track_generate_command(args: TrackGenerateArgs) -> Result<i32, CliError> {
    let request = TrackGenerateRequest {
        count: args.count,
        output_path: resolve_output_path(&args.output)?,
        seed: args.seed,
    };
    run_workflow(&request, args.config.config.as_deref())
}

pub(super) fn run_track_compare_command(args: TrackCompareArgs) -> Result<i32, CliError> {
    let request = TrackCompareRequest {
        generated_path: args.generated,
        pixelav_path: args.pixelav,
        output_path: resolve_output_path(&args.output)?,
    };
    run_workflow(&request, args.config.config.as_deref())
}

pub(super) fn run_cluster_compare_command(args: ClusterCompareArgs) -> Result<i32, CliError> {
    let request = ClusterCompareRequest {
        first_path: args.first,
        second_path: args.second,
        output_path: resolve_output_path(&args.output)?,
    };
    run_workflow(&request, args.config.config.as_deref())
}
