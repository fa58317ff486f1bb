//! Static k-d tree over a reference point set.
//!
//! Points are never copied; the tree stores a permutation of point indices
//! plus a flat node array. Nearest queries break distance ties by the lowest
//! point index, so results agree with a first-occurrence linear scan.

use crate::domain::Point3;
use crate::numerics::squared_distance3;
use std::cmp::Ordering;

const LEAF_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
enum KdNode {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        axis: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KdTree {
    order: Vec<usize>,
    nodes: Vec<KdNode>,
    root: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Nearest {
    pub(crate) index: usize,
    pub(crate) squared_distance: f64,
}

impl Nearest {
    fn improves_on(self, best: Option<Nearest>) -> bool {
        match best {
            None => true,
            Some(best) => match self.squared_distance.total_cmp(&best.squared_distance) {
                Ordering::Less => true,
                Ordering::Equal => self.index < best.index,
                Ordering::Greater => false,
            },
        }
    }
}

impl KdTree {
    /// Builds the tree. Callers guarantee every coordinate is finite.
    pub(crate) fn build(points: &[Point3]) -> Self {
        let mut order: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(2 * points.len() / LEAF_SIZE + 1);
        let root = build_node(points, &mut order, 0, &mut nodes);
        Self { order, nodes, root }
    }

    pub(crate) fn nearest(&self, points: &[Point3], query: Point3) -> Option<Nearest> {
        if self.order.is_empty() {
            return None;
        }
        let mut best = None;
        self.search(self.root, points, query, &mut best);
        best
    }

    fn search(&self, node: usize, points: &[Point3], query: Point3, best: &mut Option<Nearest>) {
        match self.nodes[node] {
            KdNode::Leaf { start, end } => {
                for &index in &self.order[start..end] {
                    let candidate = Nearest {
                        index,
                        squared_distance: squared_distance3(points[index], query),
                    };
                    if candidate.improves_on(*best) {
                        *best = Some(candidate);
                    }
                }
            }
            KdNode::Split {
                axis,
                value,
                left,
                right,
            } => {
                let delta = query[axis] - value;
                let (near, far) = if delta < 0.0 {
                    (left, right)
                } else {
                    (right, left)
                };
                self.search(near, points, query, best);

                // Equal bound still descends: a lower index may sit at the same distance.
                let plane = delta * delta;
                if best.is_none_or(|best| plane <= best.squared_distance) {
                    self.search(far, points, query, best);
                }
            }
        }
    }
}

fn build_node(
    points: &[Point3],
    order: &mut [usize],
    offset: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    if order.len() <= LEAF_SIZE {
        nodes.push(KdNode::Leaf {
            start: offset,
            end: offset + order.len(),
        });
        return nodes.len() - 1;
    }

    let axis = widest_axis(points, order);
    let median = order.len() / 2;
    order.select_nth_unstable_by(median, |lhs, rhs| {
        points[*lhs][axis]
            .total_cmp(&points[*rhs][axis])
            .then_with(|| lhs.cmp(rhs))
    });
    let value = points[order[median]][axis];

    let slot = nodes.len();
    nodes.push(KdNode::Leaf { start: 0, end: 0 });
    let (lower, upper) = order.split_at_mut(median);
    let left = build_node(points, lower, offset, nodes);
    let right = build_node(points, upper, offset + median, nodes);
    nodes[slot] = KdNode::Split {
        axis,
        value,
        left,
        right,
    };
    slot
}

fn widest_axis(points: &[Point3], order: &[usize]) -> usize {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for &index in order {
        for axis in 0..3 {
            lo[axis] = lo[axis].min(points[index][axis]);
            hi[axis] = hi[axis].max(points[index][axis]);
        }
    }

    let mut widest = 0;
    for axis in 1..3 {
        if hi[axis] - lo[axis] > hi[widest] - lo[widest] {
            widest = axis;
        }
    }
    widest
}
