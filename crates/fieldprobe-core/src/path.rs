//! Query paths stepped along one axis through a fixed anchor.

use crate::domain::{Axis, Point3, ProbeError};
use crate::numerics::arange_count;
use serde::{Deserialize, Serialize};

/// Upper bound on the queries a single segment may produce.
pub const MAX_SEGMENT_POINTS: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("segment {segment}: step must be finite and positive, got {step}")]
    InvalidStep { segment: usize, step: f64 },
    #[error("segment {segment}: bounds must be finite, got [{start}, {stop})")]
    InvalidBounds { segment: usize, start: f64, stop: f64 },
    #[error("segment {segment}: {count} points exceed the limit of {limit}", limit = MAX_SEGMENT_POINTS)]
    TooManyPoints { segment: usize, count: usize },
    #[error("anchor coordinates must be finite")]
    InvalidAnchor,
}

impl From<PathError> for ProbeError {
    fn from(error: PathError) -> Self {
        ProbeError::input_validation("INPUT.QUERY_PATH", error.to_string())
    }
}

/// Half-open range `[start, stop)` sampled every `step`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PathSegment {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl PathSegment {
    pub const fn new(start: f64, stop: f64, step: f64) -> Self {
        Self { start, stop, step }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPathSpec {
    pub axis: Axis,
    /// Supplies the two coordinates that stay fixed; its `axis` component is ignored.
    pub anchor: Point3,
    pub segments: Vec<PathSegment>,
}

impl Default for QueryPathSpec {
    fn default() -> Self {
        // Depth scan through the pixel centre of the reference sensor mesh.
        Self {
            axis: Axis::X,
            anchor: [0.0, 43.875, 15.625],
            segments: vec![
                PathSegment::new(0.0, 5.0, 0.3),
                PathSegment::new(5.0, 85.0, 5.0),
                PathSegment::new(85.0, 97.0, 2.0),
                PathSegment::new(97.0, 100.0, 0.3),
            ],
        }
    }
}

impl QueryPathSpec {
    /// Stepping-axis coordinates of every query, in path order.
    pub fn axis_coordinates(&self) -> Result<Vec<f64>, PathError> {
        let mut coordinates = Vec::new();
        for (segment_index, segment) in self.segments.iter().enumerate() {
            if !segment.start.is_finite() || !segment.stop.is_finite() {
                return Err(PathError::InvalidBounds {
                    segment: segment_index,
                    start: segment.start,
                    stop: segment.stop,
                });
            }
            let count = arange_count(segment.start, segment.stop, segment.step).ok_or(
                PathError::InvalidStep {
                    segment: segment_index,
                    step: segment.step,
                },
            )?;
            if count > MAX_SEGMENT_POINTS {
                return Err(PathError::TooManyPoints {
                    segment: segment_index,
                    count,
                });
            }
            coordinates.extend((0..count).map(|i| segment.start + i as f64 * segment.step));
        }
        Ok(coordinates)
    }

    pub fn generate(&self) -> Result<QueryPath, PathError> {
        let [first, second] = self.axis.complement();
        if !self.anchor[first.index()].is_finite() || !self.anchor[second.index()].is_finite() {
            return Err(PathError::InvalidAnchor);
        }

        let axis_coordinates = self.axis_coordinates()?;
        let points = axis_coordinates
            .iter()
            .map(|&coordinate| {
                let mut point = self.anchor;
                point[self.axis.index()] = coordinate;
                point
            })
            .collect();

        Ok(QueryPath {
            axis: self.axis,
            axis_coordinates,
            points,
        })
    }

    /// The two fixed coordinates, in x/y/z order.
    pub fn fixed_coordinates(&self) -> [f64; 2] {
        let [first, second] = self.axis.complement();
        [self.anchor[first.index()], self.anchor[second.index()]]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPath {
    pub axis: Axis,
    pub axis_coordinates: Vec<f64>,
    pub points: Vec<Point3>,
}

impl QueryPath {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_SEGMENT_POINTS, PathError, PathSegment, QueryPathSpec};
    use crate::domain::Axis;

    #[test]
    fn segments_concatenate_along_the_stepping_axis() {
        let spec = QueryPathSpec {
            axis: Axis::Z,
            anchor: [99.0, 11.0, -7.0],
            segments: vec![PathSegment::new(0.0, 1.0, 0.5), PathSegment::new(1.0, 4.0, 1.0)],
        };

        let path = spec.generate().expect("path");
        assert_eq!(path.axis_coordinates, vec![0.0, 0.5, 1.0, 2.0, 3.0]);
        assert_eq!(path.points[1], [99.0, 11.0, 0.5]);
        assert_eq!(path.points[4], [99.0, 11.0, 3.0]);
        assert_eq!(spec.fixed_coordinates(), [99.0, 11.0]);
    }

    #[test]
    fn default_path_scans_pixel_depth() {
        let spec = QueryPathSpec::default();
        let path = spec.generate().expect("path");
        assert_eq!(path.axis, Axis::X);
        assert_eq!(path.points[0], [0.0, 43.875, 15.625]);
        assert!(path.axis_coordinates.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(path.axis_coordinates.iter().all(|x| *x >= 0.0 && *x <= 100.0));
        // 17 + 16 + 6 points before the final fine segment.
        assert_eq!(path.axis_coordinates[17], 5.0);
        assert_eq!(path.axis_coordinates[33], 85.0);
        assert_eq!(path.axis_coordinates[39], 97.0);
        assert_eq!(spec.fixed_coordinates(), [43.875, 15.625]);
    }

    #[test]
    fn empty_and_inverted_segments_produce_no_points() {
        let spec = QueryPathSpec {
            axis: Axis::Y,
            anchor: [0.0, 0.0, 0.0],
            segments: vec![PathSegment::new(2.0, 1.0, 0.5)],
        };
        assert!(spec.generate().expect("path").is_empty());
    }

    #[test]
    fn invalid_segments_are_rejected() {
        let zero_step = QueryPathSpec {
            segments: vec![PathSegment::new(0.0, 1.0, 0.0)],
            ..QueryPathSpec::default()
        };
        assert_eq!(
            zero_step.generate().unwrap_err(),
            PathError::InvalidStep {
                segment: 0,
                step: 0.0
            }
        );

        let anchor = QueryPathSpec {
            anchor: [0.0, f64::NAN, 0.0],
            ..QueryPathSpec::default()
        };
        assert_eq!(anchor.generate().unwrap_err(), PathError::InvalidAnchor);

        let unbounded = QueryPathSpec {
            segments: vec![PathSegment::new(0.0, f64::INFINITY, 1.0)],
            ..QueryPathSpec::default()
        };
        assert!(matches!(
            unbounded.generate().unwrap_err(),
            PathError::InvalidBounds { segment: 0, .. }
        ));
    }

    #[test]
    fn oversized_segments_are_rejected_before_allocating() {
        let huge = QueryPathSpec {
            segments: vec![
                PathSegment::new(0.0, 1.0, 0.5),
                PathSegment::new(0.0, 1.0e30, 1.0),
            ],
            ..QueryPathSpec::default()
        };
        assert_eq!(
            huge.generate().unwrap_err(),
            PathError::TooManyPoints {
                segment: 1,
                count: usize::MAX
            }
        );

        let just_over = QueryPathSpec {
            segments: vec![PathSegment::new(0.0, (MAX_SEGMENT_POINTS + 1) as f64, 1.0)],
            ..QueryPathSpec::default()
        };
        assert!(matches!(
            just_over.generate().unwrap_err(),
            PathError::TooManyPoints { segment: 0, count } if count == MAX_SEGMENT_POINTS + 1
        ));

        let at_limit = QueryPathSpec {
            segments: vec![PathSegment::new(0.0, MAX_SEGMENT_POINTS as f64, 1.0)],
            ..QueryPathSpec::default()
        };
        assert_eq!(at_limit.axis_coordinates().expect("path").len(), MAX_SEGMENT_POINTS);
    }
}
