//! Run configuration shared by every workflow.
//!
//! All sections default to the values of the reference detector geometry, so
//! an empty JSON object (or no file at all) is a valid configuration.

use crate::domain::ProbeError;
use crate::path::QueryPathSpec;
use crate::sampler::ToleranceWindow;
use crate::workflows::clusters::ClusterAnalysisConfig;
use crate::workflows::tracks::TrackGeneratorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MERGE_TOLERANCE: ToleranceWindow = ToleranceWindow::new(0.2, 0.0005, 0.04);

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeConfig {
    pub tolerance: ToleranceWindow,
    pub profile_path: QueryPathSpec,
    pub tracks: TrackGeneratorConfig,
    pub clusters: ClusterAnalysisConfig,
    pub histograms: HistogramBins,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_MERGE_TOLERANCE,
            profile_path: QueryPathSpec::default(),
            tracks: TrackGeneratorConfig::default(),
            clusters: ClusterAnalysisConfig::default(),
            histograms: HistogramBins::default(),
        }
    }
}

/// Bin counts for the data-quality histograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistogramBins {
    pub offset: usize,
    pub value_delta: usize,
    pub coordinate: [usize; 3],
    pub track: usize,
}

impl Default for HistogramBins {
    fn default() -> Self {
        Self {
            offset: 30,
            value_delta: 100,
            coordinate: [200, 500, 200],
            track: 100,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeConfigError {
    #[error("failed to read probe config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse probe config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<ProbeConfigError> for ProbeError {
    fn from(error: ProbeConfigError) -> Self {
        match error {
            ProbeConfigError::Read { .. } => ProbeError::io_system("IO.CONFIG_READ", error.to_string()),
            ProbeConfigError::Parse { .. } => {
                ProbeError::input_validation("INPUT.CONFIG", error.to_string())
            }
        }
    }
}

pub fn load_probe_config(config_path: impl AsRef<Path>) -> Result<ProbeConfig, ProbeConfigError> {
    let config_path = config_path.as_ref();
    let source = fs::read_to_string(config_path).map_err(|source| ProbeConfigError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| ProbeConfigError::Parse {
        path: config_path.to_path_buf(),
        source,
    })
}
