//! Waypoint updater executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Input acquisition:
//!             - Pose, reference path and stopline updates from the bus
//!         - Waypoint control processing:
//!             - Closest path index lookup
//!             - Lookahead window extraction
//!             - Deceleration profile when a stopline is in the window
//!         - Trajectory publication
//!
//! The loop runs at a fixed rate. A cycle with no pose or no reference path
//! yet available performs no processing, that is the normal startup state and
//! not an error.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use wpt_lib::{
    bus,
    cycle::CycleTicker,
    data_store::DataStore,
    wpt_ctrl::InputData,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, trace, warn};
use serde::Deserialize;

// Internal
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    raise_error,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the executable itself.
#[derive(Debug, Deserialize)]
struct ExecParams {
    /// Frequency of the control cycle.
    ///
    /// Units: hertz
    pub cycle_frequency_hz: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("wpt_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Waypoint Updater Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: ExecParams = util::params::load("wpt_exec.toml")
        .wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    ds.wpt_ctrl
        .init("wpt_ctrl.toml", &session)
        .wrap_err("Failed to initialise WptCtrl")?;
    info!("WptCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE BOUNDARY ----

    let (input_sender, mut input_bus) = bus::channels();
    let (trajectory_tx, trajectory_rx) = bus::trajectory_channel();

    #[cfg(feature = "sim")]
    let _sim_handle = {
        let h = wpt_lib::sim_client::spawn(input_sender, trajectory_rx);
        info!("SimClient started");
        h
    };

    #[cfg(not(feature = "sim"))]
    {
        // Without a compiled-in input source the bus has no producers. The
        // senders are dropped here and the main loop will observe the
        // disconnect and stop after its first cycle.
        warn!("No input source compiled in, executable will stop immediately");
        drop(input_sender);
        drop(trajectory_rx);
    }

    info!("Boundary initialisation complete");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut ticker = CycleTicker::new(exec_params.cycle_frequency_hz);
    let mut trajectory_sink_lost = false;

    loop {
        // Get cycle start time
        ticker.start_cycle();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(exec_params.cycle_frequency_hz);

        // ---- DATA INPUT ----

        let updates = input_bus.poll();

        if updates.all_disconnected {
            info!("All input channels closed, stopping");
            break;
        }

        if let Some(pose) = updates.pose {
            ds.pose = Some(pose);
        }

        if let Some(stopline_idx) = updates.stopline_idx {
            if stopline_idx != ds.stopline_idx {
                debug!("Stopline index updated: {}", stopline_idx);
            }
            ds.stopline_idx = stopline_idx;
        }

        if let Some(points) = updates.path {
            info!("Reference path received ({} points)", points.len());

            match ds.wpt_ctrl.load_path(points) {
                Ok(()) => {
                    // Keep the loaded path as a session artefact
                    if let Some(path) = ds.wpt_ctrl.ref_path() {
                        session.save("ref_path.json", path);
                    }
                }
                // A degenerate path from the boundary is an integration bug
                // upstream, not a condition to limp along under
                Err(e) => raise_error!("Invalid reference path received: {}", e),
            }
        }

        // ---- WAYPOINT CONTROL PROCESSING ----

        // No processing until both a pose and a path are available, this is
        // the normal startup state
        if ds.pose.is_some() && ds.wpt_ctrl.has_path() {
            let input = InputData {
                pose: ds.pose.unwrap(),
                stopline_idx: ds.stopline_idx,
            };

            match ds.wpt_ctrl.proc(&input) {
                Ok((output, report)) => {
                    ds.wpt_ctrl_output = output;
                    ds.wpt_ctrl_status_rpt = report;
                }
                Err(e) => warn!("Error during WptCtrl processing: {}", e),
            }

            // ---- TRAJECTORY PUBLICATION ----

            if !trajectory_sink_lost
                && trajectory_tx
                    .send(ds.wpt_ctrl_output.trajectory.clone())
                    .is_err()
            {
                warn!("Trajectory consumer disconnected, publication stopped");
                trajectory_sink_lost = true;
            }

            if ds.is_1_hz_cycle {
                info!(
                    "Cycle {}: closest idx {}, {} points published, decel {}",
                    ds.num_cycles,
                    ds.wpt_ctrl_status_rpt.closest_index,
                    ds.wpt_ctrl_status_rpt.window_length,
                    if ds.wpt_ctrl_status_rpt.decel_engaged {
                        "engaged"
                    } else {
                        "off"
                    }
                );
            }
        } else {
            trace!("Pose or reference path not yet available, skipping cycle");
        }

        // ---- CYCLE MANAGEMENT ----

        match ticker.wait_remainder() {
            None => ds.num_consec_cycle_overruns = 0,
            Some(overrun) => {
                warn!("Cycle overran by {:.06} s", overrun.as_secs_f64());
                ds.num_consec_cycle_overruns += 1;
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    // Keep the last published trajectory as a session artefact
    session.save("final_trajectory.json", &ds.wpt_ctrl_output.trajectory);

    info!("End of execution");

    Ok(())
}
