//! Readers for the plain-text exports of the field solver and detector
//! simulator.
//!
//! Every format is line oriented with whitespace-separated floats. Blank lines
//! and `#` comment lines are skipped; any other line must carry exactly the
//! expected number of fields. Line numbers in errors are 1-based physical lines.

use crate::domain::{ParserResult, Point3, ProbeError};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: '{token}' is not a floating-point number")]
    InvalidNumber { line: usize, token: String },
    #[error("line {line}: missing {expected}")]
    MissingLine { line: usize, expected: &'static str },
}

impl RecordError {
    pub const fn line(&self) -> usize {
        match self {
            Self::FieldCount { line, .. }
            | Self::InvalidNumber { line, .. }
            | Self::MissingLine { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Mesh,
    VectorValues,
    ScalarValues,
    FieldTable,
    TrackList,
    PixelavTrackList,
    PixelavEvents,
}

impl RecordFormat {
    pub const fn error_code(self) -> &'static str {
        match self {
            Self::Mesh => "PARSE.MESH_RECORD",
            Self::VectorValues => "PARSE.VECTOR_RECORD",
            Self::ScalarValues => "PARSE.SCALAR_RECORD",
            Self::FieldTable => "PARSE.FIELD_TABLE_RECORD",
            Self::TrackList => "PARSE.TRACK_RECORD",
            Self::PixelavTrackList => "PARSE.PIXELAV_TRACK_RECORD",
            Self::PixelavEvents => "PARSE.PIXELAV_EVENT_RECORD",
        }
    }
}

/// Parses every data line of `source` into exactly `N` floats.
pub fn parse_records<const N: usize>(source: &str) -> Result<Vec<[f64; N]>, RecordError> {
    let mut records = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let tokens = trimmed.split_whitespace().collect::<Vec<_>>();
        if tokens.len() != N {
            return Err(RecordError::FieldCount {
                line,
                expected: N,
                found: tokens.len(),
            });
        }

        let mut record = [0.0; N];
        for (slot, token) in record.iter_mut().zip(tokens) {
            *slot = token
                .parse::<f64>()
                .map_err(|_| RecordError::InvalidNumber {
                    line,
                    token: token.to_string(),
                })?;
        }
        records.push(record);
    }
    Ok(records)
}

pub fn parse_mesh(source: &str) -> Result<Vec<Point3>, RecordError> {
    parse_records::<3>(source)
}

pub fn parse_vector_values(source: &str) -> Result<Vec<[f64; 3]>, RecordError> {
    parse_records::<3>(source)
}

pub fn parse_scalar_values(source: &str) -> Result<Vec<f64>, RecordError> {
    Ok(parse_records::<1>(source)?
        .into_iter()
        .map(|[value]| value)
        .collect())
}

/// Six-column slice export: `x y z vx vy vz` per line.
pub fn parse_field_table(source: &str) -> Result<(Vec<Point3>, Vec<[f64; 3]>), RecordError> {
    Ok(parse_records::<6>(source)?
        .into_iter()
        .map(|[x, y, z, vx, vy, vz]| ([x, y, z], [vx, vy, vz]))
        .unzip())
}

pub fn read_text_file(path: &Path) -> ParserResult<String> {
    fs::read_to_string(path).map_err(|source| {
        ProbeError::io_system(
            "IO.READ",
            format!("failed to read '{}': {}", path.display(), source),
        )
    })
}

pub fn malformed_record_error(path: &Path, format: RecordFormat, error: RecordError) -> ProbeError {
    ProbeError::malformed_record(format.error_code(), format!("{}: {}", path.display(), error))
}

pub fn read_mesh_file(path: &Path) -> ParserResult<Vec<Point3>> {
    let source = read_text_file(path)?;
    parse_mesh(&source).map_err(|error| malformed_record_error(path, RecordFormat::Mesh, error))
}

pub fn read_vector_values_file(path: &Path) -> ParserResult<Vec<[f64; 3]>> {
    let source = read_text_file(path)?;
    parse_vector_values(&source)
        .map_err(|error| malformed_record_error(path, RecordFormat::VectorValues, error))
}

pub fn read_scalar_values_file(path: &Path) -> ParserResult<Vec<f64>> {
    let source = read_text_file(path)?;
    parse_scalar_values(&source)
        .map_err(|error| malformed_record_error(path, RecordFormat::ScalarValues, error))
}

pub fn read_field_table_file(path: &Path) -> ParserResult<(Vec<Point3>, Vec<[f64; 3]>)> {
    let source = read_text_file(path)?;
    parse_field_table(&source)
        .map_err(|error| malformed_record_error(path, RecordFormat::FieldTable, error))
}
