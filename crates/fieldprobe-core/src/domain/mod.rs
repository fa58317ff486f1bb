pub mod errors;

pub use errors::{
    ParserResult, ProbeError, ProbeErrorCategory, ProbeResult, WorkflowResult,
};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Cartesian coordinate in the native units of the file it came from.
pub type Point3 = [f64; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    X,
    Y,
    Z,
}

impl Axis {
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
        }
    }

    /// The two axes held fixed while stepping along `self`, in x/y/z order.
    pub const fn complement(self) -> [Axis; 2] {
        match self {
            Self::X => [Self::Y, Self::Z],
            Self::Y => [Self::X, Self::Z],
            Self::Z => [Self::X, Self::Y],
        }
    }
}

impl Display for Axis {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

pub fn is_finite_point(point: Point3) -> bool {
    point.iter().all(|component| component.is_finite())
}

#[cfg(test)]
mod tests {
    use super::{Axis, is_finite_point};

    #[test]
    fn axis_complement_keeps_coordinate_order() {
        assert_eq!(Axis::X.complement(), [Axis::Y, Axis::Z]);
        assert_eq!(Axis::Y.complement(), [Axis::X, Axis::Z]);
        assert_eq!(Axis::Z.complement(), [Axis::X, Axis::Y]);
    }

    #[test]
    fn axis_deserializes_from_lowercase_names() {
        let axis: Axis = serde_json::from_str("\"z\"").expect("axis should parse");
        assert_eq!(axis, Axis::Z);
        assert_eq!(axis.index(), 2);
        assert_eq!(axis.to_string(), "z");
    }

    #[test]
    fn finite_point_check_rejects_nan_and_infinity() {
        assert!(is_finite_point([0.0, -1.5, 2.0]));
        assert!(!is_finite_point([f64::NAN, 0.0, 0.0]));
        assert!(!is_finite_point([0.0, 0.0, f64::INFINITY]));
    }
}
