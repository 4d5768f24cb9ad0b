//! # Data Store

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::loc::Pose;
use crate::wpt_ctrl::{self, NO_STOPLINE};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    // Localisation
    /// The most recent vehicle pose, `None` until the first pose arrives
    pub pose: Option<Pose>,

    // Stop constraint
    /// The most recent stopline index from the perception boundary. Stored
    /// unvalidated, WptCtrl clamps or ignores out-of-range values.
    pub stopline_idx: i64,

    // WptCtrl
    pub wpt_ctrl: wpt_ctrl::WptCtrl,
    pub wpt_ctrl_output: wpt_ctrl::OutputData,
    pub wpt_ctrl_status_rpt: wpt_ctrl::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl Default for DataStore {
    fn default() -> Self {
        Self {
            num_cycles: 0,
            is_1_hz_cycle: false,
            pose: None,
            stopline_idx: NO_STOPLINE,
            wpt_ctrl: Default::default(),
            wpt_ctrl_output: Default::default(),
            wpt_ctrl_status_rpt: Default::default(),
            num_consec_cycle_overruns: 0,
        }
    }
}

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and
    /// sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        self.is_1_hz_cycle = self.num_cycles % (cycle_frequency_hz as u128) == 0;

        self.wpt_ctrl_output = Default::default();
        self.wpt_ctrl_status_rpt = Default::default();
    }
}
