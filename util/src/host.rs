//! Host platform utility functions

use std::path::PathBuf;

/// Name of the environment variable giving the software root directory.
pub const SW_ROOT_ENV_VAR: &str = "WPT_SW_ROOT";

/// Get the root directory of the software installation.
///
/// The root is read from the `WPT_SW_ROOT` environment variable, and is used
/// to resolve the `params` and `sessions` directories.
pub fn get_sw_root() -> Result<PathBuf, std::env::VarError> {
    std::env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
