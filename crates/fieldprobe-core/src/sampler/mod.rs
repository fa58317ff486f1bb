//! Nearest-neighbour sampling of mesh-aligned field data.
//!
//! A [`FieldSampler`] owns a reference point set and the value records aligned
//! with it, indexes the points once, and answers batches of query points. Each
//! query resolves to the closest reference point by unweighted Euclidean
//! distance in native units (lowest index on exact ties). An optional
//! [`ToleranceWindow`] rejects matches whose per-axis offset exceeds the
//! window; rejected queries are reported, never substituted.

mod kdtree;

use crate::domain::{Point3, ProbeError, is_finite_point};
use crate::numerics::{magnitude3, offset3, squared_distance3};
use kdtree::KdTree;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplerError {
    #[error("reference point set is empty; no nearest point is definable")]
    EmptyReference,
    #[error("reference set has {points} points but {values} value records")]
    LengthMismatch { points: usize, values: usize },
    #[error("reference point {index} has a non-finite coordinate")]
    NonFiniteReference { index: usize },
    #[error("query point {index} has a non-finite coordinate")]
    NonFiniteQuery { index: usize },
    #[error("lookup point {point:?} has a non-finite coordinate")]
    NonFiniteLookup { point: Point3 },
    #[error("tolerance bound for axis {axis} must be finite and non-negative, got {value}")]
    InvalidTolerance { axis: char, value: f64 },
}

impl SamplerError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyReference => "INPUT.EMPTY_REFERENCE",
            Self::LengthMismatch { .. } => "INPUT.REFERENCE_LENGTH_MISMATCH",
            Self::NonFiniteReference { .. } => "INPUT.NON_FINITE_REFERENCE",
            Self::NonFiniteQuery { .. } | Self::NonFiniteLookup { .. } => {
                "INPUT.NON_FINITE_QUERY"
            }
            Self::InvalidTolerance { .. } => "INPUT.INVALID_TOLERANCE",
        }
    }
}

impl From<SamplerError> for ProbeError {
    fn from(error: SamplerError) -> Self {
        ProbeError::input_validation(error.code(), error.to_string())
    }
}

/// Value records aligned by index with the reference points.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValues {
    Scalar(Vec<f64>),
    Vector(Vec<[f64; 3]>),
}

impl FieldValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(values) => values.len(),
            Self::Vector(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize, mode: ValueMode) -> SampledValue {
        match self {
            Self::Scalar(values) => SampledValue::Scalar(values[index]),
            Self::Vector(values) => match mode {
                ValueMode::Magnitude => SampledValue::Scalar(magnitude3(values[index])),
                ValueMode::Raw => SampledValue::Vector(values[index]),
            },
        }
    }
}

/// How vector records are reported. Scalar records are always returned as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueMode {
    #[default]
    Magnitude,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampledValue {
    Scalar(f64),
    Vector([f64; 3]),
}

impl SampledValue {
    /// Scalar form: the value itself, or the Euclidean magnitude of a vector.
    pub fn as_scalar(self) -> f64 {
        match self {
            Self::Scalar(value) => value,
            Self::Vector(vector) => magnitude3(vector),
        }
    }

    pub fn as_vector(self) -> Option<[f64; 3]> {
        match self {
            Self::Scalar(_) => None,
            Self::Vector(vector) => Some(vector),
        }
    }
}

/// Per-axis maximum absolute offset between a query and its match.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ToleranceWindow {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ToleranceWindow {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn uniform(bound: f64) -> Self {
        Self::new(bound, bound, bound)
    }

    pub fn validate(&self) -> Result<(), SamplerError> {
        for (axis, value) in [('x', self.x), ('y', self.y), ('z', self.z)] {
            if !value.is_finite() || value < 0.0 {
                return Err(SamplerError::InvalidTolerance { axis, value });
            }
        }
        Ok(())
    }

    pub fn accepts(&self, offset: [f64; 3]) -> bool {
        offset[0].abs() <= self.x && offset[1].abs() <= self.y && offset[2].abs() <= self.z
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleMatch {
    pub query_index: usize,
    pub query: Point3,
    pub reference_index: usize,
    pub reference: Point3,
    /// `query - reference` per axis.
    pub offset: [f64; 3],
    pub distance: f64,
    pub value: SampledValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DroppedQuery {
    pub query_index: usize,
    pub query: Point3,
    pub nearest_reference_index: usize,
    pub offset: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleReport {
    pub matches: Vec<SampleMatch>,
    pub dropped: Vec<DroppedQuery>,
    /// One entry per query: `true` when the query produced a match.
    pub mask: Vec<bool>,
}

impl SampleReport {
    pub fn values(&self) -> Vec<SampledValue> {
        self.matches.iter().map(|matched| matched.value).collect()
    }

    pub fn scalar_values(&self) -> Vec<f64> {
        self.matches
            .iter()
            .map(|matched| matched.value.as_scalar())
            .collect()
    }

    pub fn accepted_count(&self) -> usize {
        self.matches.len()
    }

    pub fn query_count(&self) -> usize {
        self.mask.len()
    }
}

#[derive(Debug)]
struct ReferenceIndex {
    points: Vec<Point3>,
    tree: KdTree,
}

/// Indexed reference set. Immutable after [`FieldSampler::build`].
///
/// Cloning, or attaching another value set with [`FieldSampler::with_values`],
/// shares the spatial index instead of rebuilding it.
#[derive(Debug, Clone)]
pub struct FieldSampler {
    index: Arc<ReferenceIndex>,
    values: FieldValues,
}

impl FieldSampler {
    pub fn build(points: Vec<Point3>, values: FieldValues) -> Result<Self, SamplerError> {
        if points.is_empty() {
            return Err(SamplerError::EmptyReference);
        }
        if points.len() != values.len() {
            return Err(SamplerError::LengthMismatch {
                points: points.len(),
                values: values.len(),
            });
        }
        if let Some(index) = points.iter().position(|point| !is_finite_point(*point)) {
            return Err(SamplerError::NonFiniteReference { index });
        }

        let tree = KdTree::build(&points);
        Ok(Self {
            index: Arc::new(ReferenceIndex { points, tree }),
            values,
        })
    }

    /// Same reference points and index, different aligned value records.
    pub fn with_values(&self, values: FieldValues) -> Result<Self, SamplerError> {
        if values.len() != self.len() {
            return Err(SamplerError::LengthMismatch {
                points: self.len(),
                values: values.len(),
            });
        }
        Ok(Self {
            index: Arc::clone(&self.index),
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.index.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.points.is_empty()
    }

    pub fn points(&self) -> &[Point3] {
        &self.index.points
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    /// Index and Euclidean distance of the reference point closest to `query`.
    pub fn nearest(&self, query: Point3) -> Result<(usize, f64), SamplerError> {
        if !is_finite_point(query) {
            return Err(SamplerError::NonFiniteLookup { point: query });
        }
        self.index
            .tree
            .nearest(&self.index.points, query)
            .map(|nearest| (nearest.index, nearest.squared_distance.sqrt()))
            .ok_or(SamplerError::EmptyReference)
    }

    pub fn sample(
        &self,
        queries: &[Point3],
        tolerance: Option<ToleranceWindow>,
        mode: ValueMode,
    ) -> Result<SampleReport, SamplerError> {
        if let Some(window) = tolerance.as_ref() {
            window.validate()?;
        }
        if let Some(index) = queries.iter().position(|query| !is_finite_point(*query)) {
            return Err(SamplerError::NonFiniteQuery { index });
        }

        let mut report = SampleReport {
            matches: Vec::with_capacity(queries.len()),
            dropped: Vec::new(),
            mask: Vec::with_capacity(queries.len()),
        };

        for (query_index, query) in queries.iter().copied().enumerate() {
            let nearest = self
                .index
                .tree
                .nearest(&self.index.points, query)
                .ok_or(SamplerError::EmptyReference)?;
            let reference = self.index.points[nearest.index];
            let offset = offset3(query, reference);

            if tolerance.is_some_and(|window| !window.accepts(offset)) {
                report.dropped.push(DroppedQuery {
                    query_index,
                    query,
                    nearest_reference_index: nearest.index,
                    offset,
                });
                report.mask.push(false);
                continue;
            }

            report.matches.push(SampleMatch {
                query_index,
                query,
                reference_index: nearest.index,
                reference,
                offset,
                distance: nearest.squared_distance.sqrt(),
                value: self.values.get(nearest.index, mode),
            });
            report.mask.push(true);
        }

        Ok(report)
    }
}

/// One-shot sampling: builds an index over the reference set and samples
/// `queries`, reporting vector records by magnitude.
pub fn sample(
    reference_points: &[Point3],
    reference_values: &FieldValues,
    queries: &[Point3],
    tolerance: Option<ToleranceWindow>,
) -> Result<SampleReport, SamplerError> {
    FieldSampler::build(reference_points.to_vec(), reference_values.clone())?.sample(
        queries,
        tolerance,
        ValueMode::Magnitude,
    )
}

/// Linear-scan nearest point, first index winning on ties. Used to
/// cross-check the indexed search.
pub fn nearest_brute_force(points: &[Point3], query: Point3) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, point) in points.iter().enumerate() {
        let squared = squared_distance3(*point, query);
        if best.is_none_or(|(_, best_squared)| squared < best_squared) {
            best = Some((index, squared));
        }
    }
    best.map(|(index, squared)| (index, squared.sqrt()))
}
