//! # Input/output boundary channels
//!
//! The hosting framework delivers pose, reference path and stopline updates
//! asynchronously. Each channel carries the latest value of its state only:
//! the cyclic executive drains every channel once per cycle and keeps the
//! final value, so a burst of updates between two cycles collapses to the
//! most recent one ("last value wins"). Nothing blocks and no history
//! accumulates.
//!
//! The obstacle channel is accepted but intentionally unused, it is a
//! reserved extension point.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;

// Internal
use crate::loc::Pose;
use crate::path::PathPoint;
use crate::wpt_ctrl::Trajectory;

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Producer half of the input boundary. Clone one per external source.
#[derive(Clone)]
pub struct InputSender {
    pub pose_tx: Sender<Pose>,
    pub path_tx: Sender<Vec<PathPoint>>,
    pub stopline_tx: Sender<i64>,
    pub obstacle_tx: Sender<i64>,
}

/// Consumer half of the input boundary, owned by the cyclic executive.
pub struct InputBus {
    pose_rx: Receiver<Pose>,
    path_rx: Receiver<Vec<PathPoint>>,
    stopline_rx: Receiver<i64>,
    obstacle_rx: Receiver<i64>,

    pose_disconnected: bool,
    path_disconnected: bool,
    stopline_disconnected: bool,
    obstacle_disconnected: bool,
}

/// The latest value of each input after draining the bus for one cycle.
#[derive(Default)]
pub struct BusUpdates {
    pub pose: Option<Pose>,
    pub path: Option<Vec<PathPoint>>,
    pub stopline_idx: Option<i64>,

    /// True once every producer has disconnected, the executive has no
    /// further input to wait for.
    pub all_disconnected: bool,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Create the trajectory output channel.
///
/// The cyclic executive publishes one trajectory per cycle on the sender, the
/// downstream controller owns the receiver.
pub fn trajectory_channel() -> (Sender<Trajectory>, Receiver<Trajectory>) {
    channel()
}

/// Create a connected sender/bus pair.
pub fn channels() -> (InputSender, InputBus) {
    let (pose_tx, pose_rx) = channel();
    let (path_tx, path_rx) = channel();
    let (stopline_tx, stopline_rx) = channel();
    let (obstacle_tx, obstacle_rx) = channel();

    (
        InputSender {
            pose_tx,
            path_tx,
            stopline_tx,
            obstacle_tx,
        },
        InputBus {
            pose_rx,
            path_rx,
            stopline_rx,
            obstacle_rx,
            pose_disconnected: false,
            path_disconnected: false,
            stopline_disconnected: false,
            obstacle_disconnected: false,
        },
    )
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl InputBus {
    /// Drain all channels, returning the latest value of each.
    pub fn poll(&mut self) -> BusUpdates {
        let mut updates = BusUpdates::default();

        updates.pose = Self::drain(&self.pose_rx, &mut self.pose_disconnected);
        updates.path = Self::drain(&self.path_rx, &mut self.path_disconnected);
        updates.stopline_idx = Self::drain(&self.stopline_rx, &mut self.stopline_disconnected);

        // Reserved: obstacle updates are drained and dropped
        if Self::drain(&self.obstacle_rx, &mut self.obstacle_disconnected).is_some() {
            trace!("Obstacle update received, ignored");
        }

        updates.all_disconnected = self.pose_disconnected
            && self.path_disconnected
            && self.stopline_disconnected
            && self.obstacle_disconnected;

        updates
    }

    /// Drain one channel keeping only the most recent value.
    ///
    /// A disconnected producer is flagged once its channel has been fully
    /// drained.
    fn drain<T>(rx: &Receiver<T>, disconnected: &mut bool) -> Option<T> {
        let mut latest = None;

        loop {
            match rx.try_recv() {
                Ok(value) => latest = Some(value),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    *disconnected = true;
                    break;
                }
            }
        }

        latest
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_last_value_wins() {
        let (sender, mut bus) = channels();

        sender.stopline_tx.send(4).unwrap();
        sender.stopline_tx.send(7).unwrap();
        sender.stopline_tx.send(-1).unwrap();

        let updates = bus.poll();
        assert_eq!(updates.stopline_idx, Some(-1));
        assert!(!updates.all_disconnected);

        // Nothing accumulates between polls
        let updates = bus.poll();
        assert_eq!(updates.stopline_idx, None);
    }

    #[test]
    fn test_disconnect_detected() {
        let (sender, mut bus) = channels();

        sender.stopline_tx.send(2).unwrap();
        drop(sender);

        // The value sent before disconnecting is still delivered
        let updates = bus.poll();
        assert_eq!(updates.stopline_idx, Some(2));
        assert!(updates.all_disconnected);
    }
}
