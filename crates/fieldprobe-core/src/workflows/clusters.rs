//! Charge-cluster features of PixelAV `.out` runs and their comparison between
//! two runs of the same sensor configuration.
//!
//! A run starts with a header line and a pixel-statistics line. Each event is
//! the charge map printed after the `<time slice 4000` marker and is closed by a
//! `<cluster>` line, which is followed by one line of cluster truth. Charge
//! maps are whitespace-separated rows of pixel charges in electrons.

use super::{Workflow, WorkflowArtifact, WorkflowOutcome};
use crate::config::ProbeConfig;
use crate::domain::{ParserResult, ProbeError, WorkflowResult};
use crate::numerics::Distribution;
use crate::parser::{RecordError, RecordFormat, malformed_record_error, read_text_file};
use crate::serialization::write_json_artifact;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_CLUSTER_COMPARISON_NAME: &str = "cluster_comparison.json";

const EVENT_MARKER: &str = "<time slice 4000";
const CLUSTER_MARKER: &str = "<cluster>";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterAnalysisConfig {
    /// Pixels with a charge strictly above this belong to the cluster.
    pub threshold: f64,
    pub feature_bins: usize,
    pub delta_bins: usize,
    pub delta_range: [f64; 2],
}

impl Default for ClusterAnalysisConfig {
    fn default() -> Self {
        Self {
            threshold: 10.0,
            feature_bins: 100,
            delta_bins: 40,
            delta_range: [-20.0, 20.0],
        }
    }
}

impl ClusterAnalysisConfig {
    pub fn validate(&self) -> Result<(), ClusterError> {
        if !self.threshold.is_finite() {
            return Err(ClusterError::InvalidConfig {
                field: "threshold",
                value: self.threshold,
            });
        }
        for (field, bins) in [
            ("featureBins", self.feature_bins),
            ("deltaBins", self.delta_bins),
        ] {
            if bins == 0 {
                return Err(ClusterError::InvalidConfig { field, value: 0.0 });
            }
        }
        let [low, high] = self.delta_range;
        if !low.is_finite() || !high.is_finite() || low >= high {
            return Err(ClusterError::InvalidConfig {
                field: "deltaRange",
                value: high - low,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClusterError {
    #[error("cluster analysis setting {field} is out of range: {value}")]
    InvalidConfig { field: &'static str, value: f64 },
}

impl From<ClusterError> for ProbeError {
    fn from(error: ClusterError) -> Self {
        ProbeError::input_validation("INPUT.CLUSTER_CONFIG", error.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pixel {
    pub row: usize,
    pub column: usize,
}

/// Charges of one event, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeMap {
    rows: usize,
    columns: usize,
    charges: Vec<f64>,
}

impl ChargeMap {
    /// Returns `None` unless `charges` fills a non-empty `rows x columns` grid.
    pub fn new(rows: usize, columns: usize, charges: Vec<f64>) -> Option<Self> {
        if rows == 0 || columns == 0 || rows.checked_mul(columns) != Some(charges.len()) {
            return None;
        }
        Some(Self {
            rows,
            columns,
            charges,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn charge(&self, row: usize, column: usize) -> Option<f64> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.charges.get(row * self.columns + column).copied()
    }

    fn pixel(&self, flat: usize) -> Pixel {
        Pixel {
            row: flat / self.columns,
            column: flat % self.columns,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PixelavRun {
    pub header: String,
    pub pixel_stats: String,
    pub events: Vec<ChargeMap>,
    pub cluster_truth: Vec<String>,
}

impl PixelavRun {
    pub fn features(&self, threshold: f64) -> Vec<ClusterFeatures> {
        self.events
            .iter()
            .map(|event| analyze_event(event, threshold))
            .collect()
    }
}

/// Rows of the charge map currently being read.
struct EventBlock {
    columns: Option<usize>,
    rows: usize,
    charges: Vec<f64>,
}

impl EventBlock {
    fn new() -> Self {
        Self {
            columns: None,
            rows: 0,
            charges: Vec::new(),
        }
    }

    fn push_row(&mut self, line: usize, text: &str) -> Result<(), RecordError> {
        let tokens = text.split_whitespace().collect::<Vec<_>>();
        let expected = *self.columns.get_or_insert(tokens.len());
        if tokens.len() != expected {
            return Err(RecordError::FieldCount {
                line,
                expected,
                found: tokens.len(),
            });
        }
        for token in tokens {
            let charge = token
                .parse::<f64>()
                .map_err(|_| RecordError::InvalidNumber {
                    line,
                    token: token.to_string(),
                })?;
            self.charges.push(charge);
        }
        self.rows += 1;
        Ok(())
    }

    fn finish(self) -> Option<ChargeMap> {
        ChargeMap::new(self.rows, self.columns?, self.charges)
    }
}

/// Splits a PixelAV run into charge maps.
///
/// A block without rows is dropped. A block still open at the end of the file
/// is kept as the last event. Other `<...>` tag lines and blank lines inside a
/// block are ignored.
pub fn parse_pixelav_events(source: &str) -> Result<PixelavRun, RecordError> {
    let mut lines = source.lines().enumerate();
    let mut preamble = |line: usize, expected: &'static str| {
        lines
            .next()
            .map(|(_, text)| text.trim().to_string())
            .ok_or(RecordError::MissingLine { line, expected })
    };
    let header = preamble(1, "run header")?;
    let pixel_stats = preamble(2, "pixel statistics line")?;

    let mut run = PixelavRun {
        header,
        pixel_stats,
        ..PixelavRun::default()
    };
    let mut block: Option<EventBlock> = None;
    let mut truth_pending = false;

    for (index, raw) in lines {
        let line = index + 1;
        let trimmed = raw.trim();
        if truth_pending {
            run.cluster_truth.push(trimmed.to_string());
            truth_pending = false;
            continue;
        }
        if trimmed.contains(EVENT_MARKER) {
            block = Some(EventBlock::new());
            continue;
        }
        if trimmed.contains(CLUSTER_MARKER) {
            run.events.extend(block.take().and_then(EventBlock::finish));
            truth_pending = true;
            continue;
        }
        let Some(open) = block.as_mut() else {
            continue;
        };
        if trimmed.is_empty() || trimmed.starts_with('<') {
            continue;
        }
        open.push_row(line, trimmed)?;
    }
    run.events.extend(block.and_then(EventBlock::finish));
    Ok(run)
}

pub fn read_pixelav_events_file(path: &Path) -> ParserResult<PixelavRun> {
    let source = read_text_file(path)?;
    parse_pixelav_events(&source)
        .map_err(|error| malformed_record_error(path, RecordFormat::PixelavEvents, error))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterFeatures {
    pub max_charge: f64,
    pub max_pixel: Pixel,
    /// Highest charge among the remaining pixels; a tie with the maximum
    /// counts. `None` for a single-pixel map.
    pub second_charge: Option<f64>,
    pub second_pixel: Option<Pixel>,
    /// Rows spanned by pixels above threshold, 0 when there are none.
    pub x_span: usize,
    pub y_span: usize,
    pub area: usize,
}

/// Extracts the charge features of one event. Ties go to the first pixel in
/// row-major order.
pub fn analyze_event(map: &ChargeMap, threshold: f64) -> ClusterFeatures {
    let highest = |skip: Option<usize>| {
        map.charges
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != skip)
            .fold(None, |best: Option<(usize, f64)>, (index, &charge)| match best {
                Some((_, top)) if charge.total_cmp(&top).is_le() => best,
                _ => Some((index, charge)),
            })
    };
    // A ChargeMap is never empty.
    let (max_index, max_charge) = highest(None).unwrap_or((0, f64::NAN));
    let second = highest(Some(max_index));

    let mut row_range: Option<(usize, usize)> = None;
    let mut column_range: Option<(usize, usize)> = None;
    let mut area = 0;
    for (index, &charge) in map.charges.iter().enumerate() {
        if charge > threshold {
            let Pixel { row, column } = map.pixel(index);
            row_range = Some(widen(row_range, row));
            column_range = Some(widen(column_range, column));
            area += 1;
        }
    }

    ClusterFeatures {
        max_charge,
        max_pixel: map.pixel(max_index),
        second_charge: second.map(|(_, charge)| charge),
        second_pixel: second.map(|(index, _)| map.pixel(index)),
        x_span: span(row_range),
        y_span: span(column_range),
        area,
    }
}

fn widen(range: Option<(usize, usize)>, value: usize) -> (usize, usize) {
    match range {
        Some((low, high)) => (low.min(value), high.max(value)),
        None => (value, value),
    }
}

fn span(range: Option<(usize, usize)>) -> usize {
    range.map_or(0, |(low, high)| high - low + 1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDistribution {
    pub name: &'static str,
    pub unit: &'static str,
    pub values: Distribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRunReport {
    pub header: String,
    pub event_count: usize,
    pub cluster_count: usize,
    pub features: Vec<FeatureDistribution>,
}

impl ClusterRunReport {
    fn new(run: &PixelavRun, features: &[ClusterFeatures], bins: usize) -> Self {
        let feature = |name, unit, values: Vec<f64>| FeatureDistribution {
            name,
            unit,
            values: Distribution::from_values(&values, bins, None),
        };
        let column = |select: fn(&ClusterFeatures) -> f64| {
            features.iter().map(select).collect::<Vec<_>>()
        };

        Self {
            header: run.header.clone(),
            event_count: run.events.len(),
            cluster_count: run.cluster_truth.len(),
            features: vec![
                feature("maxCharge", "e", column(|f| f.max_charge)),
                feature(
                    "max2Charge",
                    "e",
                    features.iter().filter_map(|f| f.second_charge).collect(),
                ),
                feature("xSpan", "pixels", column(|f| f.x_span as f64)),
                feature("ySpan", "pixels", column(|f| f.y_span as f64)),
                feature("area", "pixels", column(|f| f.area as f64)),
            ],
        }
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureDistribution> {
        self.features.iter().find(|feature| feature.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterComparisonReport {
    pub threshold: f64,
    /// Events compared one to one: the shorter run's event count.
    pub paired_events: usize,
    pub event_count_mismatch: bool,
    pub first: ClusterRunReport,
    pub second: ClusterRunReport,
    /// First run minus second run, per paired event.
    pub deltas: Vec<FeatureDistribution>,
}

impl ClusterComparisonReport {
    pub fn new(first: &PixelavRun, second: &PixelavRun, config: &ClusterAnalysisConfig) -> Self {
        let ours = first.features(config.threshold);
        let theirs = second.features(config.threshold);
        let [low, high] = config.delta_range;
        let delta = |name, select: fn(&ClusterFeatures) -> usize| {
            let values = ours
                .iter()
                .zip(&theirs)
                .map(|(a, b)| select(a) as f64 - select(b) as f64)
                .collect::<Vec<_>>();
            FeatureDistribution {
                name,
                unit: "pixels",
                values: Distribution::from_values(&values, config.delta_bins, Some((low, high))),
            }
        };

        Self {
            threshold: config.threshold,
            paired_events: ours.len().min(theirs.len()),
            event_count_mismatch: ours.len() != theirs.len(),
            first: ClusterRunReport::new(first, &ours, config.feature_bins),
            second: ClusterRunReport::new(second, &theirs, config.feature_bins),
            deltas: vec![
                delta("xSpanDelta", |f| f.x_span),
                delta("ySpanDelta", |f| f.y_span),
            ],
        }
    }

    pub fn delta(&self, name: &str) -> Option<&FeatureDistribution> {
        self.deltas.iter().find(|delta| delta.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterCompareRequest {
    pub first_path: PathBuf,
    pub second_path: PathBuf,
    pub output_path: PathBuf,
}

impl Workflow for ClusterCompareRequest {
    fn name(&self) -> &'static str {
        "clusters-compare"
    }

    fn execute(&self, config: &ProbeConfig) -> WorkflowResult<WorkflowOutcome> {
        config.clusters.validate()?;
        let first = read_pixelav_events_file(&self.first_path)?;
        let second = read_pixelav_events_file(&self.second_path)?;
        info!(
            first = first.events.len(),
            second = second.events.len(),
            "loaded PixelAV runs"
        );
        debug!(first = %first.header, second = %second.header, "run headers");

        let report = ClusterComparisonReport::new(&first, &second, &config.clusters);
        if report.event_count_mismatch {
            warn!(
                first = report.first.event_count,
                second = report.second.event_count,
                paired = report.paired_events,
                "event counts differ; deltas cover the paired events only"
            );
        }
        write_json_artifact(&self.output_path, &report)?;

        let mut summary = vec![format!(
            "events: first {}, second {}{}",
            report.first.event_count,
            report.second.event_count,
            if report.event_count_mismatch {
                " (counts differ)"
            } else {
                ""
            }
        )];
        for delta in &report.deltas {
            summary.push(match &delta.values.stats {
                Some(stats) => format!(
                    "{} [{}]: mean {}, rms {} over {} events",
                    delta.name, delta.unit, stats.mean, stats.rms, stats.count
                ),
                None => format!("{} [{}]: no paired events", delta.name, delta.unit),
            });
        }

        Ok(WorkflowOutcome {
            summary,
            artifacts: vec![WorkflowArtifact::new(self.output_path.clone())],
        })
    }
}
