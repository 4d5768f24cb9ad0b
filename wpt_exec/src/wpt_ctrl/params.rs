//! Waypoint control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for waypoint control
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Number of waypoints published ahead of the vehicle each cycle.
    pub lookahead_count: usize,

    /// Magnitude of the deceleration used to build stopping profiles.
    ///
    /// Units: meters/second^2
    pub max_decel_mss: f64,

    /// Speeds below this threshold are snapped to zero, so the final approach
    /// to a stopline is a hard stop rather than an asymptotic crawl.
    ///
    /// Units: meters/second
    pub stop_snap_speed_ms: f64,

    /// Number of path points to stop short of the stopline, accounting for
    /// the vehicle's footprint overshooting the stop position.
    ///
    /// Tuning between 2 and 3 points has been used, keep this configurable
    /// rather than baked in.
    pub stop_safety_margin_points: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            lookahead_count: 50,
            max_decel_mss: 3.0,
            stop_snap_speed_ms: 1.0,
            stop_safety_margin_points: 2,
        }
    }
}
