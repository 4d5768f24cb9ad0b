//! # Waypoint control module
//!
//! Waypoint control is responsible for producing, each cycle, the bounded
//! window of target waypoints the downstream controller should track. It
//! looks up the path index closest to the vehicle (adjusted so the window
//! never starts behind the direction of travel), extracts the lookahead
//! window from the reference path, and, when a stopline falls inside that
//! window, replaces the nominal speeds with a deceleration profile that
//! brings the vehicle to rest at the stopline.
//!
//! The profile follows `v = sqrt(2 * a * d)` for the configured deceleration
//! magnitude `a` and the remaining path distance `d`, capped by each point's
//! nominal speed so the module only ever slows the vehicle down. Speeds below
//! the snap threshold are forced to zero so the final approach is a hard stop
//! rather than an asymptotic crawl.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod finder;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use finder::*;
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during WptCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum WptCtrlError {
    #[error("Invalid reference path: {0}")]
    InvalidPath(#[from] crate::path::PathError),
}
