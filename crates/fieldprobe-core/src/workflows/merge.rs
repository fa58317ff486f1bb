//! Merging two independently meshed slice exports of the same field.
//!
//! The query table keeps its in-plane components; the out-of-plane component
//! comes from the nearest point of the reference table. Only matches inside
//! the tolerance window are merged.

use super::{Workflow, WorkflowArtifact, WorkflowOutcome};
use crate::config::{HistogramBins, ProbeConfig};
use crate::domain::{Point3, WorkflowResult};
use crate::numerics::{Histogram, SummaryStats};
use crate::parser::read_field_table_file;
use crate::sampler::{FieldSampler, FieldValues, SampleReport, SamplerError, ToleranceWindow, ValueMode};
use crate::serialization::{join_f64, write_json_artifact, write_text_artifact};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

pub const COMBINED_FILE_NAME: &str = "combined_data.txt";
pub const QUALITY_REPORT_FILE_NAME: &str = "merge_quality.json";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergedFieldRecord {
    pub query: Point3,
    /// `(vx_query, vy_query, vz_reference)`.
    pub field: [f64; 3],
    pub matched: Point3,
    /// `query - matched` per axis.
    pub offset: [f64; 3],
    /// `vy_query - vy_reference`.
    pub vy_delta: f64,
}

impl MergedFieldRecord {
    pub fn render(&self) -> String {
        let mut values = Vec::with_capacity(9);
        values.extend_from_slice(&self.query);
        values.extend_from_slice(&self.field);
        values.extend_from_slice(&self.matched);
        join_f64(&values, ", ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub records: Vec<MergedFieldRecord>,
    pub sample: SampleReport,
}

pub fn merge_field_tables(
    query_points: &[Point3],
    query_vectors: &[[f64; 3]],
    reference_points: Vec<Point3>,
    reference_vectors: Vec<[f64; 3]>,
    tolerance: ToleranceWindow,
) -> Result<MergeResult, SamplerError> {
    if query_points.len() != query_vectors.len() {
        return Err(SamplerError::LengthMismatch {
            points: query_points.len(),
            values: query_vectors.len(),
        });
    }

    let sampler = FieldSampler::build(reference_points, FieldValues::Vector(reference_vectors))?;
    let sample = sampler.sample(query_points, Some(tolerance), ValueMode::Raw)?;

    let records = sample
        .matches
        .iter()
        .filter_map(|matched| {
            let reference = matched.value.as_vector()?;
            let own = query_vectors[matched.query_index];
            Some(MergedFieldRecord {
                query: matched.query,
                field: [own[0], own[1], reference[2]],
                matched: matched.reference,
                offset: matched.offset,
                vy_delta: own[1] - reference[1],
            })
        })
        .collect();

    Ok(MergeResult { records, sample })
}

pub fn render_combined(records: &[MergedFieldRecord]) -> String {
    let mut rendered = String::new();
    for record in records {
        rendered.push_str(&record.render());
        rendered.push('\n');
    }
    rendered
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisSummaries {
    pub x: Option<SummaryStats>,
    pub y: Option<SummaryStats>,
    pub z: Option<SummaryStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeHistograms {
    pub delta_x: Option<Histogram>,
    pub delta_y: Option<Histogram>,
    pub delta_z: Option<Histogram>,
    pub delta_vy: Option<Histogram>,
    pub coord_x: Option<Histogram>,
    pub coord_y: Option<Histogram>,
    pub coord_z: Option<Histogram>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeQualityReport {
    pub query_count: usize,
    pub accepted: usize,
    pub dropped: usize,
    pub tolerance: ToleranceWindow,
    pub offsets: AxisSummaries,
    pub vy_delta: Option<SummaryStats>,
    pub histograms: MergeHistograms,
}

impl MergeQualityReport {
    pub fn from_result(result: &MergeResult, tolerance: ToleranceWindow, bins: HistogramBins) -> Self {
        let records = &result.records;
        let delta_x = column(records, |record| record.offset[0]);
        let delta_y = column(records, |record| record.offset[1]);
        let delta_z = column(records, |record| record.offset[2]);
        let vy_delta = column(records, |record| record.vy_delta);
        let coord_x = column(records, |record| record.query[0]);
        let coord_y = column(records, |record| record.query[1]);
        let coord_z = column(records, |record| record.query[2]);

        Self {
            query_count: result.sample.query_count(),
            accepted: result.records.len(),
            dropped: result.sample.dropped.len(),
            tolerance,
            offsets: AxisSummaries {
                x: SummaryStats::from_values(&delta_x),
                y: SummaryStats::from_values(&delta_y),
                z: SummaryStats::from_values(&delta_z),
            },
            vy_delta: SummaryStats::from_values(&vy_delta),
            histograms: MergeHistograms {
                delta_x: Histogram::from_values(&delta_x, bins.offset, None),
                delta_y: Histogram::from_values(&delta_y, bins.offset, None),
                delta_z: Histogram::from_values(&delta_z, bins.offset, None),
                delta_vy: Histogram::from_values(&vy_delta, bins.value_delta, None),
                coord_x: Histogram::from_values(&coord_x, bins.coordinate[0], None),
                coord_y: Histogram::from_values(&coord_y, bins.coordinate[1], None),
                coord_z: Histogram::from_values(&coord_z, bins.coordinate[2], None),
            },
        }
    }
}

fn column(records: &[MergedFieldRecord], select: impl Fn(&MergedFieldRecord) -> f64) -> Vec<f64> {
    records.iter().map(select).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeRequest {
    pub query_table: PathBuf,
    pub reference_table: PathBuf,
    pub output_dir: PathBuf,
}

impl Workflow for MergeRequest {
    fn name(&self) -> &'static str {
        "merge"
    }

    fn execute(&self, config: &ProbeConfig) -> WorkflowResult<WorkflowOutcome> {
        let (query_points, query_vectors) = read_field_table_file(&self.query_table)?;
        let (reference_points, reference_vectors) = read_field_table_file(&self.reference_table)?;
        info!(
            queries = query_points.len(),
            references = reference_points.len(),
            "loaded field tables"
        );

        let result = merge_field_tables(
            &query_points,
            &query_vectors,
            reference_points,
            reference_vectors,
            config.tolerance,
        )?;
        let report = MergeQualityReport::from_result(&result, config.tolerance, config.histograms);
        if report.accepted == 0 && report.query_count > 0 {
            warn!(
                queries = report.query_count,
                "no query point matched within the tolerance window"
            );
        }

        let combined_path = self.output_dir.join(COMBINED_FILE_NAME);
        let report_path = self.output_dir.join(QUALITY_REPORT_FILE_NAME);
        write_text_artifact(&combined_path, &render_combined(&result.records))?;
        write_json_artifact(&report_path, &report)?;
        info!(
            accepted = report.accepted,
            dropped = report.dropped,
            output = %combined_path.display(),
            "merged field tables"
        );

        Ok(WorkflowOutcome {
            summary: vec![format!(
                "Merged {} of {} query points ({} outside tolerance).",
                report.accepted, report.query_count, report.dropped
            )],
            artifacts: vec![
                WorkflowArtifact::new(combined_path),
                WorkflowArtifact::new(report_path),
            ],
        })
    }
}
