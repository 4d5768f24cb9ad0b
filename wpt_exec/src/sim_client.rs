//! # Simulation client
//!
//! Provides synthetic input data for running the executable without the rest
//! of the vehicle stack: a circular reference track, a pose trace driving
//! around it and a stopline that engages partway through the run. All data is
//! fed through the same input bus the real boundary would use.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;
use nalgebra::{UnitQuaternion, Vector3};

// Internal
use crate::bus::InputSender;
use crate::loc::Pose;
use crate::path::PathPoint;
use crate::wpt_ctrl::{Trajectory, NO_STOPLINE};

use std::sync::mpsc::Receiver;
use std::thread;
use std::time::Duration;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Radius of the synthetic circular track
const TRACK_RADIUS_M: f64 = 50.0;

/// Number of points on the synthetic track
const TRACK_NUM_POINTS: usize = 360;

/// Nominal speed at every track point
const TRACK_SPEED_MS: f64 = 10.0;

/// Period between simulated pose updates
const POSE_PERIOD_MS: u64 = 40;

/// Number of pose updates the simulation runs for
const NUM_POSE_UPDATES: usize = 500;

/// Pose update at which the stopline engages
const STOPLINE_ON_UPDATE: usize = 150;

/// Pose update at which the stopline clears
const STOPLINE_OFF_UPDATE: usize = 350;

/// Track points the stopline is placed ahead of the vehicle
const STOPLINE_AHEAD_POINTS: usize = 40;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Spawn the simulation thread feeding the given sender.
///
/// The simulation also stands in for the downstream controller, draining the
/// trajectory output channel. The thread drops its senders when the run
/// completes, which the cyclic executive observes as an
/// all-channels-disconnected bus and uses to stop.
pub fn spawn(
    sender: InputSender,
    trajectory_rx: Receiver<Trajectory>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || run(sender, trajectory_rx))
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the synthetic circular track.
fn track() -> Vec<PathPoint> {
    (0..TRACK_NUM_POINTS)
        .map(|i| {
            let angle_rad =
                i as f64 / TRACK_NUM_POINTS as f64 * 2.0 * std::f64::consts::PI;

            PathPoint {
                position_m: Vector3::new(
                    TRACK_RADIUS_M * angle_rad.cos(),
                    TRACK_RADIUS_M * angle_rad.sin(),
                    0.0,
                ),
                // The track is anticlockwise, the tangent leads the angle by
                // a quarter turn
                heading_rad: angle_rad + std::f64::consts::FRAC_PI_2,
                speed_ms: TRACK_SPEED_MS,
            }
        })
        .collect()
}

/// Simulation main function.
fn run(sender: InputSender, trajectory_rx: Receiver<Trajectory>) {
    info!("Simulation started");

    // The reference path is sent exactly once, before any pose
    if sender.path_tx.send(track()).is_err() {
        return;
    }

    // Angular step matching the track speed at the pose update period
    let step_rad =
        TRACK_SPEED_MS * (POSE_PERIOD_MS as f64 / 1000.0) / TRACK_RADIUS_M;

    for i in 0..NUM_POSE_UPDATES {
        let angle_rad = i as f64 * step_rad;

        let pose = Pose {
            position_m: Vector3::new(
                TRACK_RADIUS_M * angle_rad.cos(),
                TRACK_RADIUS_M * angle_rad.sin(),
                0.0,
            ),
            attitude_q: UnitQuaternion::from_euler_angles(
                0.0,
                0.0,
                angle_rad + std::f64::consts::FRAC_PI_2,
            ),
        };

        if sender.pose_tx.send(pose).is_err() {
            return;
        }

        // Engage a stopline ahead of the vehicle partway through the run,
        // and clear it again later
        if i == STOPLINE_ON_UPDATE {
            let vehicle_point = (angle_rad / (2.0 * std::f64::consts::PI)
                * TRACK_NUM_POINTS as f64) as usize;
            let stopline_idx =
                ((vehicle_point + STOPLINE_AHEAD_POINTS) % TRACK_NUM_POINTS) as i64;

            info!("Simulation: stopline engaged at track point {}", stopline_idx);
            if sender.stopline_tx.send(stopline_idx).is_err() {
                return;
            }
        }
        if i == STOPLINE_OFF_UPDATE {
            info!("Simulation: stopline cleared");
            if sender.stopline_tx.send(NO_STOPLINE).is_err() {
                return;
            }
        }

        // Stand-in for the downstream controller: consume the published
        // trajectories, keeping only the latest
        if let Some(trajectory) = trajectory_rx.try_iter().last() {
            if i % 25 == 0 {
                if let Some(first) = trajectory.points.first() {
                    info!(
                        "Simulation: {} target points, current target speed {:.2} m/s",
                        trajectory.points.len(),
                        first.speed_ms
                    );
                }
            }
        }

        thread::sleep(Duration::from_millis(POSE_PERIOD_MS));
    }

    info!("Simulation finished");
}
