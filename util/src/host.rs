//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Name of the environment variable pointing at the software root directory.
pub const SW_ROOT_ENV_VAR: &str = "FOLLOW_SW_ROOT";

/// Get the software root directory from the `FOLLOW_SW_ROOT` environment
/// variable.
///
/// The root is expected to contain the `params` directory, and is where
/// session directories are created.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
