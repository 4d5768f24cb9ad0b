//! Waypoint control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use nalgebra::Vector3;
use serde::Serialize;

// Internal
use super::{Params, WaypointFinder, WptCtrlError};
use crate::loc::Pose;
use crate::path::{PathPoint, RefPath};
use util::{maths, module::State, params, raise_error, session::Session};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Stopline index value meaning "no active stop constraint".
///
/// Any negative value is treated the same way, this is the value the
/// perception boundary nominally sends.
pub const NO_STOPLINE: i64 = -1;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Waypoint control module state
#[derive(Default)]
pub struct WptCtrl {
    params: Params,

    /// The reference path and its finder. Built together on path receipt so
    /// queries only ever see a consistent pair.
    path: Option<RefPath>,
    finder: Option<WaypointFinder>,

    report: StatusReport,
}

/// Input data to the module
#[derive(Copy, Clone)]
pub struct InputData {
    /// The most recent vehicle pose
    pub pose: Pose,

    /// The most recent stopline index from the perception boundary. Negative
    /// means no active stop constraint, out-of-range values are ignored.
    pub stopline_idx: i64,
}

/// A single target point of the published trajectory.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct TrajPoint {
    /// The position of the point in the map frame
    pub position_m: Vector3<f64>,

    /// The heading of the path at this point
    pub heading_rad: f64,

    /// The target speed at this point.
    ///
    /// Units: meters/second
    pub speed_ms: f64,
}

/// The trajectory window published to the downstream controller.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Trajectory {
    pub points: Vec<TrajPoint>,
}

#[derive(Default, Clone)]
pub struct OutputData {
    pub trajectory: Trajectory,
}

/// The status report containing monitoring quantities for this cycle.
#[derive(Default, Copy, Clone, Serialize, Debug)]
pub struct StatusReport {
    /// The path index the window starts at
    pub closest_index: usize,

    /// Number of points in the published window
    pub window_length: usize,

    /// If true the deceleration profile was applied this cycle
    pub decel_engaged: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for WptCtrl {
    type InitData = &'static str;
    type InitError = params::LoadError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = WptCtrlError;

    /// Initialise the WptCtrl module.
    ///
    /// Expected init data is the path to the parameter file.
    fn init(&mut self, init_data: Self::InitData, _session: &Session)
        -> Result<(), Self::InitError>
    {
        self.params = params::load(init_data)?;

        Ok(())
    }

    /// Perform cyclic processing of waypoint control.
    ///
    /// Processing involves:
    ///  1. Finding the path index at or ahead of the vehicle.
    ///  2. Extracting the lookahead window from the reference path.
    ///  3. Applying the deceleration profile if a stopline falls inside the
    ///     window, otherwise passing the nominal speeds through.
    ///
    /// The output is a pure function of the input and the loaded path, two
    /// calls with the same state produce identical trajectories.
    ///
    /// # Panics
    /// - If no reference path has been loaded. The cyclic executive must not
    ///   call `proc` before a path has been received, doing so indicates a
    ///   startup-order bug in the hosting process.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        // Clear the status report
        self.report = StatusReport::default();

        let (path, finder) = match (&self.path, &self.finder) {
            (Some(p), Some(f)) => (p, f),
            _ => raise_error!("WptCtrl::proc called with no reference path loaded"),
        };

        // ---- CLOSEST POINT LOOKUP ----

        let closest_index = finder.closest_ahead(path, &input_data.pose);

        // ---- WINDOW EXTRACTION ----

        let window = path.window(closest_index, self.params.lookahead_count);

        // ---- SPEED PROFILE ----

        let trajectory = match stop_offset_in_window(
            path,
            closest_index,
            window.len(),
            input_data.stopline_idx,
            self.params.stop_safety_margin_points,
        ) {
            Some(stop_offset) => {
                debug!(
                    "Deceleration engaged: stopline idx {}, closest idx {}",
                    input_data.stopline_idx, closest_index
                );
                self.report.decel_engaged = true;
                decelerate(&window, stop_offset, &self.params)
            }
            None => passthrough(&window),
        };

        self.report.closest_index = closest_index;
        self.report.window_length = trajectory.points.len();

        Ok((OutputData { trajectory }, self.report))
    }
}

impl WptCtrl {
    /// Create a module with the given parameters, bypassing file loading.
    pub fn from_params(params: Params) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// Load a new reference path, building the waypoint finder over it.
    ///
    /// In normal operation the path arrives exactly once. A replacement swaps
    /// the path and finder together so the next cycle sees a consistent pair.
    pub fn load_path(&mut self, points: Vec<PathPoint>) -> Result<(), WptCtrlError> {
        if self.path.is_some() {
            warn!("Reference path replaced, rebuilding the waypoint finder");
        }

        let path = RefPath::new(points)?;
        let finder = WaypointFinder::build(&path);

        self.path = Some(path);
        self.finder = Some(finder);

        Ok(())
    }

    /// True once a reference path has been loaded.
    pub fn has_path(&self) -> bool {
        self.path.is_some()
    }

    /// Get the loaded reference path, if any.
    pub fn ref_path(&self) -> Option<&RefPath> {
        self.path.as_ref()
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Decide whether the stopline requires a deceleration profile this cycle.
///
/// Returns the stop offset within the window (the point the profile reaches
/// zero at, safety margin already applied), or `None` if the window passes
/// through unmodified.
///
/// The stopline index is interpreted on the circular path: the forward offset
/// from the closest index is always in `[0, num_points)`, so a stopline just
/// behind the vehicle appears nearly a full lap ahead and is ignored along
/// with indices outside the path.
fn stop_offset_in_window(
    path: &RefPath,
    closest_index: usize,
    window_length: usize,
    stopline_idx: i64,
    safety_margin: usize,
) -> Option<usize> {
    if stopline_idx < 0 || stopline_idx >= path.num_points() as i64 {
        return None;
    }

    let rel_stop = path.forward_offset(closest_index, stopline_idx as usize);

    if rel_stop >= window_length {
        return None;
    }

    Some(rel_stop.saturating_sub(safety_margin))
}

/// Pass the window through with its nominal speeds.
fn passthrough(window: &[PathPoint]) -> Trajectory {
    Trajectory {
        points: window
            .iter()
            .map(|wp| TrajPoint {
                position_m: wp.position_m,
                heading_rad: wp.heading_rad,
                speed_ms: wp.speed_ms,
            })
            .collect(),
    }
}

/// Replace the window's speeds with a profile decelerating to rest at
/// `stop_offset`.
///
/// Speeds follow `v = sqrt(2 * a * d)` for the path distance `d` to the stop
/// point, capped by each point's nominal speed. Distances are clamped to zero
/// for points at or beyond the stop point, which keeps the sqrt argument in
/// domain and forces those points to rest.
fn decelerate(window: &[PathPoint], stop_offset: usize, params: &Params) -> Trajectory {
    // Cumulative path distance from the window start to each point
    let mut cum_dist_m = vec![0f64; window.len()];
    for i in 1..window.len() {
        cum_dist_m[i] = cum_dist_m[i - 1]
            + (window[i].position_m - window[i - 1].position_m).norm();
    }

    let points = window
        .iter()
        .enumerate()
        .map(|(i, wp)| {
            let dist_m = (cum_dist_m[stop_offset] - cum_dist_m[i]).max(0.0);

            let mut speed_ms = (2.0 * params.max_decel_mss * dist_m).sqrt();

            // Snap the final crawl to a full stop
            if speed_ms < params.stop_snap_speed_ms {
                speed_ms = 0.0;
            }

            TrajPoint {
                position_m: wp.position_m,
                heading_rad: wp.heading_rad,
                // The profile only ever slows the vehicle down relative to
                // the path's intrinsic limit
                speed_ms: maths::clamp(&speed_ms, &0.0, &wp.speed_ms),
            }
        })
        .collect();

    Trajectory { points }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use nalgebra::{UnitQuaternion, Vector3};

    use super::*;

    /// Path of `num_points` evenly spaced points 1 m apart on a line, nominal
    /// speed 5 m/s at all points.
    fn line_points(num_points: usize) -> Vec<PathPoint> {
        (0..num_points)
            .map(|i| PathPoint {
                position_m: Vector3::new(i as f64, 0.0, 0.0),
                heading_rad: 0.0,
                speed_ms: 5.0,
            })
            .collect()
    }

    fn pose_at(x: f64, y: f64) -> Pose {
        Pose {
            position_m: Vector3::new(x, y, 0.0),
            attitude_q: UnitQuaternion::identity(),
        }
    }

    /// Module under the concrete scenario parameters: L=5, decel 2, margin 2.
    fn test_module() -> WptCtrl {
        let mut ctrl = WptCtrl::from_params(Params {
            lookahead_count: 5,
            max_decel_mss: 2.0,
            stop_snap_speed_ms: 1.0,
            stop_safety_margin_points: 2,
        });
        ctrl.load_path(line_points(10)).unwrap();
        ctrl
    }

    fn speeds(output: &OutputData) -> Vec<f64> {
        output.trajectory.points.iter().map(|p| p.speed_ms).collect()
    }

    #[test]
    fn test_no_stopline_passes_window_through() {
        let mut ctrl = test_module();

        let (output, report) = ctrl
            .proc(&InputData {
                pose: pose_at(3.1, 0.0),
                stopline_idx: NO_STOPLINE,
            })
            .unwrap();

        assert!(!report.decel_engaged);
        assert_eq!(speeds(&output), vec![5.0; 5]);
    }

    #[test]
    fn test_stopline_beyond_window_passes_through() {
        let mut ctrl = test_module();

        // Closest index resolves to 1, window covers indices 1..=5
        let (output, report) = ctrl
            .proc(&InputData {
                pose: pose_at(0.6, 0.0),
                stopline_idx: 8,
            })
            .unwrap();

        assert!(!report.decel_engaged);
        assert_eq!(speeds(&output), vec![5.0; 5]);
    }

    #[test]
    fn test_stopline_out_of_range_ignored() {
        let mut ctrl = test_module();

        for &idx in &[-5, 10, 1000] {
            let (output, report) = ctrl
                .proc(&InputData {
                    pose: pose_at(3.1, 0.0),
                    stopline_idx: idx,
                })
                .unwrap();

            assert!(!report.decel_engaged);
            assert_eq!(speeds(&output), vec![5.0; 5]);
        }
    }

    #[test]
    fn test_concrete_deceleration_scenario() {
        // 10 points 1 m apart, speed 5, L=5, decel 2, stopline 6, margin 2.
        // At closest index 3 the stop offset is 1: window point 0 is 1 m from
        // the stop point giving v = sqrt(2*2*1) = 2, point 1 is at the stop,
        // everything beyond is at rest.
        let mut ctrl = test_module();

        let (output, report) = ctrl
            .proc(&InputData {
                pose: pose_at(2.9, 0.0),
                stopline_idx: 6,
            })
            .unwrap();

        assert!(report.decel_engaged);
        assert_eq!(report.closest_index, 3);
        assert_eq!(speeds(&output), vec![2.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_deceleration_monotonic_in_distance() {
        let mut ctrl = WptCtrl::from_params(Params {
            lookahead_count: 40,
            max_decel_mss: 0.8,
            stop_snap_speed_ms: 1.0,
            stop_safety_margin_points: 0,
        });
        ctrl.load_path(line_points(60)).unwrap();

        let (output, report) = ctrl
            .proc(&InputData {
                pose: pose_at(0.1, 0.0),
                stopline_idx: 30,
            })
            .unwrap();

        assert!(report.decel_engaged);

        let speeds = speeds(&output);

        // Non-increasing toward the stop point, exactly zero at and beyond it
        for pair in speeds.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
        let stop_offset = 30 - report.closest_index;
        for &speed in &speeds[stop_offset..] {
            assert_eq!(speed, 0.0);
        }
        assert!(speeds[0] > 0.0);
    }

    #[test]
    fn test_profile_never_exceeds_nominal_speed() {
        let mut ctrl = WptCtrl::from_params(Params {
            lookahead_count: 40,
            max_decel_mss: 50.0,
            stop_snap_speed_ms: 1.0,
            stop_safety_margin_points: 0,
        });
        ctrl.load_path(line_points(60)).unwrap();

        let (output, _) = ctrl
            .proc(&InputData {
                pose: pose_at(0.1, 0.0),
                stopline_idx: 35,
            })
            .unwrap();

        // A very aggressive decel bound produces large sqrt speeds far from
        // the stop, the nominal speed must cap every point
        for point in &output.trajectory.points {
            assert!(point.speed_ms <= 5.0);
            assert!(point.speed_ms >= 0.0);
        }
    }

    #[test]
    fn test_stopline_at_vehicle_stops_immediately() {
        let mut ctrl = WptCtrl::from_params(Params {
            lookahead_count: 5,
            max_decel_mss: 2.0,
            stop_snap_speed_ms: 1.0,
            stop_safety_margin_points: 0,
        });
        ctrl.load_path(line_points(10)).unwrap();

        let (output, report) = ctrl
            .proc(&InputData {
                pose: pose_at(2.9, 0.0),
                stopline_idx: 3,
            })
            .unwrap();

        // Stop offset 0: zero target speed from the current position on
        assert_eq!(report.closest_index, 3);
        assert_eq!(speeds(&output), vec![0.0; 5]);
    }

    #[test]
    fn test_stopline_behind_vehicle_ignored() {
        let mut ctrl = test_module();

        // Vehicle just past point 3 resolves to closest index 4, the
        // stopline at 3 is behind and maps to a forward offset of nearly a
        // full lap, well outside the window
        let (output, report) = ctrl
            .proc(&InputData {
                pose: pose_at(3.1, 0.0),
                stopline_idx: 3,
            })
            .unwrap();

        assert!(!report.decel_engaged);
        assert_eq!(report.closest_index, 4);
        assert_eq!(speeds(&output), vec![5.0; 5]);
    }

    #[test]
    fn test_stopline_across_wrap_decelerates() {
        // Circular interpretation: vehicle near the end of the point list,
        // stopline just past the wrap
        let mut ctrl = WptCtrl::from_params(Params {
            lookahead_count: 5,
            max_decel_mss: 2.0,
            stop_snap_speed_ms: 1.0,
            stop_safety_margin_points: 2,
        });
        ctrl.load_path(line_points(10)).unwrap();

        let (output, report) = ctrl
            .proc(&InputData {
                pose: pose_at(7.9, 0.0),
                stopline_idx: 1,
            })
            .unwrap();

        assert!(report.decel_engaged);
        assert_eq!(report.closest_index, 8);

        // Forward offset to the stopline is 3, margin 2 leaves the stop one
        // point ahead of the window start
        let speeds = speeds(&output);
        assert_eq!(speeds[1..], [0.0, 0.0, 0.0, 0.0]);
        assert!(speeds[0] > 0.0);
    }

    #[test]
    fn test_proc_is_idempotent() {
        let mut ctrl = test_module();

        let input = InputData {
            pose: pose_at(3.1, 0.0),
            stopline_idx: 6,
        };

        let (first, _) = ctrl.proc(&input).unwrap();
        let (second, _) = ctrl.proc(&input).unwrap();

        assert_eq!(speeds(&first), speeds(&second));
        for (a, b) in first
            .trajectory
            .points
            .iter()
            .zip(second.trajectory.points.iter())
        {
            assert_eq!(a.position_m, b.position_m);
        }
    }

    #[test]
    #[should_panic]
    fn test_proc_without_path_panics() {
        let mut ctrl = WptCtrl::from_params(Params::default());

        let _ = ctrl.proc(&InputData {
            pose: pose_at(0.0, 0.0),
            stopline_idx: NO_STOPLINE,
        });
    }
}
