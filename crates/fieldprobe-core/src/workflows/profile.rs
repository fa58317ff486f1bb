//! Line profiles of mesh quantities through a sensor pixel.

use super::{Workflow, WorkflowArtifact, WorkflowOutcome};
use crate::config::ProbeConfig;
use crate::domain::{Point3, ProbeError, WorkflowResult};
use crate::parser::{read_mesh_file, read_scalar_values_file, read_vector_values_file};
use crate::path::{QueryPath, QueryPathSpec};
use crate::sampler::{FieldSampler, FieldValues, ValueMode};
use crate::serialization::{join_f64, write_text_artifact};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileQuantity {
    /// Vector field file; the profile holds its magnitude.
    FieldMagnitude,
    /// One or more scalar files (potential, doping species) on the same mesh.
    Scalar,
}

impl ProfileQuantity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FieldMagnitude => "field",
            Self::Scalar => "scalar",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileTable {
    pub axis_coordinates: Vec<f64>,
    /// One column per value file, each aligned with `axis_coordinates`.
    pub columns: Vec<Vec<f64>>,
}

impl ProfileTable {
    pub fn render_csv(&self) -> String {
        let mut rendered = String::new();
        for (row, coordinate) in self.axis_coordinates.iter().enumerate() {
            let mut values = Vec::with_capacity(self.columns.len() + 1);
            values.push(*coordinate);
            values.extend(self.columns.iter().map(|column| column[row]));
            rendered.push_str(&join_f64(&values, ","));
            rendered.push('\n');
        }
        rendered
    }
}

/// Samples every value set along `path`; all sets share the `mesh` points.
pub fn sample_profile(
    mesh: &[Point3],
    value_sets: Vec<FieldValues>,
    path: &QueryPath,
) -> WorkflowResult<ProfileTable> {
    let mut columns = Vec::with_capacity(value_sets.len());
    let mut indexed: Option<FieldSampler> = None;
    for values in value_sets {
        let sampler = match indexed.as_ref() {
            Some(previous) => previous.with_values(values)?,
            None => FieldSampler::build(mesh.to_vec(), values)?,
        };
        let report = sampler.sample(&path.points, None, ValueMode::Magnitude)?;
        columns.push(report.scalar_values());
        indexed = Some(sampler);
    }

    Ok(ProfileTable {
        axis_coordinates: path.axis_coordinates.clone(),
        columns,
    })
}

pub fn default_profile_file_name(spec: &QueryPathSpec) -> String {
    let [first, second] = spec.fixed_coordinates();
    format!("parsed_profile_at_{}_{}.csv", first, second)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRequest {
    pub mesh_path: PathBuf,
    pub value_paths: Vec<PathBuf>,
    pub quantity: ProfileQuantity,
    pub output_dir: PathBuf,
    /// Overrides the file name derived from the path anchor.
    pub output_name: Option<String>,
}

impl ProfileRequest {
    fn validate(&self) -> WorkflowResult<()> {
        match (self.quantity, self.value_paths.len()) {
            (_, 0) => Err(ProbeError::input_validation(
                "INPUT.PROFILE_VALUES",
                "profile requires at least one value file",
            )),
            (ProfileQuantity::FieldMagnitude, count) if count > 1 => {
                Err(ProbeError::input_validation(
                    "INPUT.PROFILE_VALUES",
                    format!("field profile takes exactly one vector file, got {}", count),
                ))
            }
            _ => Ok(()),
        }
    }

    fn read_value_sets(&self) -> WorkflowResult<Vec<FieldValues>> {
        self.value_paths
            .iter()
            .map(|path| read_values(path, self.quantity))
            .collect()
    }
}

fn read_values(path: &Path, quantity: ProfileQuantity) -> WorkflowResult<FieldValues> {
    match quantity {
        ProfileQuantity::FieldMagnitude => read_vector_values_file(path).map(FieldValues::Vector),
        ProfileQuantity::Scalar => read_scalar_values_file(path).map(FieldValues::Scalar),
    }
}

impl Workflow for ProfileRequest {
    fn name(&self) -> &'static str {
        "profile"
    }

    fn execute(&self, config: &ProbeConfig) -> WorkflowResult<WorkflowOutcome> {
        self.validate()?;
        let spec = &config.profile_path;
        let path = spec.generate()?;

        let mesh = read_mesh_file(&self.mesh_path)?;
        info!(
            mesh = %self.mesh_path.display(),
            points = mesh.len(),
            "loaded reference mesh"
        );
        let value_sets = self.read_value_sets()?;
        debug!(sets = value_sets.len(), queries = path.len(), "sampling profile");

        let table = sample_profile(&mesh, value_sets, &path)?;
        let file_name = self
            .output_name
            .clone()
            .unwrap_or_else(|| default_profile_file_name(spec));
        let output_path = self.output_dir.join(file_name);
        write_text_artifact(&output_path, &table.render_csv())?;
        info!(output = %output_path.display(), rows = table.axis_coordinates.len(), "wrote profile");

        Ok(WorkflowOutcome {
            summary: vec![format!(
                "Sampled {} {} column(s) at {} points along {}.",
                table.columns.len(),
                self.quantity.as_str(),
                table.axis_coordinates.len(),
                path.axis
            )],
            artifacts: vec![WorkflowArtifact::new(output_path)],
        })
    }
}
