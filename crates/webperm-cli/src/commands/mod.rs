//! Command implementations for webperm-cli

pub mod check;
pub mod plan;
pub mod reconcile;
pub mod settings;

pub use check::run_check;
pub use plan::run_plan;
pub use reconcile::{run_apply, run_replay};

use std::path::PathBuf;

use crate::error::Result;

/// Absolute path of the running binary, for artifact shebangs.
pub(crate) fn interpreter() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(dunce::canonicalize(&exe).unwrap_or(exe))
}
