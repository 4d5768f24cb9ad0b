//! Waypoint finder - nearest path index lookup with ahead/behind
//! disambiguation
//!
//! The finder is a k-d tree over the path's XY positions, built once when the
//! path is received. A raw nearest-neighbour query can return a point the
//! vehicle has already passed, which would make the published window start
//! behind the vehicle, so the nearest index is checked against the local path
//! direction and advanced by one if it lies behind.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use kiddo::{KdTree, SquaredEuclidean};
use log::warn;

// Internal
use crate::loc::Pose;
use crate::path::RefPath;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Static nearest-neighbour index over the reference path's XY positions.
///
/// Built once per path receipt, read-only afterwards.
pub struct WaypointFinder {
    tree: KdTree<f64, 2>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WaypointFinder {
    /// Build the finder from the given path.
    ///
    /// The path is guaranteed non-degenerate (at least 2 points) by
    /// [`RefPath::new`], so queries on the built finder always succeed.
    pub fn build(path: &RefPath) -> Self {
        let mut tree: KdTree<f64, 2> = KdTree::new();

        for (i, point) in path.points().iter().enumerate() {
            tree.add(&[point.position_m[0], point.position_m[1]], i as u64);
        }

        Self { tree }
    }

    /// Return the index of the path point nearest to the given XY position.
    ///
    /// Ties between duplicate points are broken by the tree, deterministically
    /// for a given build.
    pub fn nearest(&self, x: f64, y: f64) -> usize {
        self.tree.nearest_one::<SquaredEuclidean>(&[x, y]).item as usize
    }

    /// Return the path index representing the vehicle's current position,
    /// ahead of or at the vehicle, never behind.
    ///
    /// The hyperplane through the nearest point, normal to the local path
    /// direction, separates "ahead" from "behind" positions. If the vehicle
    /// lies on the far side of that plane the nearest point has already been
    /// passed and the next index is returned instead.
    pub fn closest_ahead(&self, path: &RefPath, pose: &Pose) -> usize {
        let position = pose.position2();
        let closest = self.nearest(position[0], position[1]);

        // Local path direction at the closest point
        let direction = path.get(closest).position2() - path.get(path.prev_index(closest)).position2();
        let to_vehicle = position - path.get(closest).position2();

        // Co-located points give no usable direction, keep the nearest index
        if direction.norm_squared() <= std::f64::EPSILON {
            warn!(
                "Degenerate path direction at index {}, keeping nearest point",
                closest
            );
            return closest;
        }

        // Positive dot product puts the vehicle past the nearest point
        if direction.dot(&to_vehicle) > 0.0 {
            path.next_index(closest)
        }
        else {
            closest
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use nalgebra::{UnitQuaternion, Vector3};

    use super::*;
    use crate::path::PathPoint;

    fn pose_at(x: f64, y: f64) -> Pose {
        Pose {
            position_m: Vector3::new(x, y, 0.0),
            attitude_q: UnitQuaternion::identity(),
        }
    }

    fn line_path(num_points: usize) -> RefPath {
        RefPath::new(
            (0..num_points)
                .map(|i| PathPoint {
                    position_m: Vector3::new(i as f64, 0.0, 0.0),
                    heading_rad: 0.0,
                    speed_ms: 5.0,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_nearest_in_bounds() {
        let path = line_path(7);
        let finder = WaypointFinder::build(&path);

        for &(x, y) in &[
            (0.0, 0.0),
            (-100.0, 3.0),
            (100.0, -3.0),
            (3.4, 0.2),
            (5.5, 12.0),
        ] {
            let index = finder.nearest(x, y);
            assert!(index < path.num_points());
        }
    }

    #[test]
    fn test_past_midpoint_resolves_forward() {
        // Vehicle between points 0 and 1, past the midpoint toward point 1:
        // nearest is 1 and the vehicle has not yet passed it, so 1 is kept.
        let path = line_path(3);
        let finder = WaypointFinder::build(&path);

        assert_eq!(finder.closest_ahead(&path, &pose_at(0.6, 0.1)), 1);
    }

    #[test]
    fn test_passed_point_is_skipped() {
        // Vehicle just past point 1: a raw nearest query returns 1, which is
        // behind the vehicle, so the finder advances to 2.
        let path = line_path(3);
        let finder = WaypointFinder::build(&path);

        assert_eq!(finder.nearest(1.2, 0.1), 1);
        assert_eq!(finder.closest_ahead(&path, &pose_at(1.2, 0.1)), 2);
    }

    #[test]
    fn test_behind_midpoint_keeps_nearest() {
        // Vehicle before the midpoint of segment 0-1: nearest is 0. The
        // wrap-around segment from the last point gives the local direction
        // at index 0, and the vehicle lies behind its hyperplane, so 0 is
        // kept.
        let path = line_path(3);
        let finder = WaypointFinder::build(&path);

        assert_eq!(finder.closest_ahead(&path, &pose_at(0.4, -0.1)), 0);
    }

    #[test]
    fn test_degenerate_direction_keeps_nearest() {
        // Points 0 and 1 are separated by far less than the float epsilon,
        // the local direction at index 1 is degenerate and the finder must
        // keep the nearest index rather than advance.
        let points = vec![
            PathPoint {
                position_m: Vector3::new(0.0, 0.0, 0.0),
                heading_rad: 0.0,
                speed_ms: 5.0,
            },
            PathPoint {
                position_m: Vector3::new(1.0e-9, 0.0, 0.0),
                heading_rad: 0.0,
                speed_ms: 5.0,
            },
            PathPoint {
                position_m: Vector3::new(1.0, 0.0, 0.0),
                heading_rad: 0.0,
                speed_ms: 5.0,
            },
        ];
        let path = RefPath::new(points).unwrap();
        let finder = WaypointFinder::build(&path);

        // Strictly nearest to point 1, and past it, but the degenerate
        // direction suppresses the advance to index 2
        assert_eq!(finder.closest_ahead(&path, &pose_at(2.0e-9, 0.0)), 1);
    }
}
