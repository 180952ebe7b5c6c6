//! Plan command implementation

use webperm_core::{Artifact, Plan, Settings, StateModel};
use webperm_fs::SystemOps;

use crate::error::Result;

/// Run the plan command
///
/// Prints the artifact text apply would write. Nothing is changed.
pub fn run_plan(settings: &Settings) -> Result<()> {
    let ops = SystemOps::new();
    let model = StateModel::build(settings.resolve(&ops)?)?;
    let text = Artifact::render(&Plan::from_model(&model), &super::interpreter()?)?;
    print!("{text}");
    Ok(())
}
