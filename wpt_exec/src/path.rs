//! # Reference path store
//!
//! This module defines the fixed reference path the vehicle is tracking. The
//! path is an ordered sequence of waypoints, each carrying a position, a
//! heading and the nominal speed the vehicle may drive at that point. The
//! path is logically circular: all index arithmetic wraps modulo the number
//! of points, so closed-loop tracks are handled without special cases.
//!
//! The path is loaded once from the boundary and is read-only afterwards.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single point on the reference path.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    /// The position of the point in the map frame
    pub position_m: Vector3<f64>,

    /// The heading (angle to the positive map X axis) of the path at this
    /// point
    pub heading_rad: f64,

    /// The nominal target speed at this point.
    ///
    /// Units: meters/second
    pub speed_ms: f64,
}

/// The reference path the vehicle is tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefPath {
    points: Vec<PathPoint>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("A reference path needs at least 2 points, found {0}")]
    TooFewPoints(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathPoint {
    /// Return the position projected onto the map XY plane.
    pub fn position2(&self) -> Vector2<f64> {
        Vector2::new(self.position_m[0], self.position_m[1])
    }
}

impl RefPath {
    /// Create a new path from an ordered sequence of points.
    ///
    /// Paths with fewer than 2 points cannot support index disambiguation and
    /// are rejected.
    pub fn new(points: Vec<PathPoint>) -> Result<Self, PathError> {
        if points.len() < 2 {
            return Err(PathError::TooFewPoints(points.len()));
        }

        Ok(Self { points })
    }

    /// Get the number of points in the path
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Get the point at the given index, wrapping modulo the path length.
    pub fn get(&self, index: usize) -> &PathPoint {
        &self.points[index % self.points.len()]
    }

    /// Get the index preceding the given one, wrapping at the start of the
    /// path.
    pub fn prev_index(&self, index: usize) -> usize {
        (index + self.points.len() - 1) % self.points.len()
    }

    /// Get the index following the given one, wrapping at the end of the path.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.points.len()
    }

    /// Number of points travelled when driving forward from `from` to `to`,
    /// wrapping at the end of the path. Always in `[0, num_points)`.
    pub fn forward_offset(&self, from: usize, to: usize) -> usize {
        (to + self.points.len() - from) % self.points.len()
    }

    /// Extract the window of `count` consecutive points starting at `start`,
    /// advancing forward with wraparound.
    ///
    /// The window is clamped to one full lap, each physical point appears at
    /// most once.
    pub fn window(&self, start: usize, count: usize) -> Vec<PathPoint> {
        let len = count.min(self.points.len());

        (0..len)
            .map(|i| *self.get(start + i))
            .collect()
    }

    /// Get all points of the path in order.
    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// Build a straight line path along the x axis with 1 m point separation.
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
    fn test_too_few_points_rejected() {
        assert!(RefPath::new(vec![]).is_err());
        assert!(RefPath::new(vec![PathPoint {
            position_m: Vector3::zeros(),
            heading_rad: 0.0,
            speed_ms: 0.0,
        }])
        .is_err());
    }

    #[test]
    fn test_index_wrapping() {
        let path = line_path(10);

        assert_eq!(path.get(10).position_m[0], 0.0);
        assert_eq!(path.get(13).position_m[0], 3.0);
        assert_eq!(path.prev_index(0), 9);
        assert_eq!(path.next_index(9), 0);
        assert_eq!(path.forward_offset(8, 2), 4);
        assert_eq!(path.forward_offset(2, 8), 6);
    }

    #[test]
    fn test_window_wraps_at_path_end() {
        let path = line_path(10);

        let window = path.window(9, 3);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].position_m[0], 9.0);
        // The second element wraps back to path index 0
        assert_eq!(window[1].position_m[0], 0.0);
        assert_eq!(window[2].position_m[0], 1.0);
    }

    #[test]
    fn test_window_clamped_to_path_length() {
        let path = line_path(4);

        let window = path.window(0, 50);
        assert_eq!(window.len(), 4);
    }
}
