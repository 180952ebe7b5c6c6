//! Permission reconciliation for web document roots
//!
//! This crate implements the layer between the ops backends in `webperm-fs`
//! and the CLI:
//!
//! - **Settings**: user-facing configuration resolved against live accounts
//! - **State model**: ordered path classes with their desired state
//! - **Plan**: the literal action list derived from a model
//! - **Reconciler**: precondition checks, plan execution, failure classification
//! - **Checker**: read-only drift reporting
//! - **Artifacts**: plans frozen into executable repair files, and their replay
//!
//! # Architecture
//!
//! ```text
//!   Settings -> ResolvedParams -> StateModel -> Plan
//!                                                |
//!                              +-----------------+----------------+
//!                              |                                  |
//!                         Reconciler  <- replay <- Artifact <- ArtifactGenerator
//!                              |
//!                        PermissionOps (SystemOps | MemoryOps)
//! ```

pub mod artifact;
pub mod check;
pub mod error;
pub mod model;
pub mod plan;
pub mod reconcile;
pub mod settings;

pub use artifact::{ARTIFACT_VERSION, Artifact, ArtifactGenerator, replay};
pub use check::{CheckReport, CheckStatus, Checker, DriftItem};
pub use error::{Error, Result};
pub use model::{Desired, Ownership, PathClass, PathClassKind, StateModel};
pub use plan::{Action, Plan, PlanParams, Step};
pub use reconcile::{AppliedAction, ReconcileOptions, ReconcileReport, Reconciler, ToleratedFailure};
pub use settings::{ResolvedParams, Settings};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn apply_failed_names_class_and_action() {
        let error = Error::ApplyFailed {
            class: PathClassKind::CodeTree,
            action: "chmod -R d=0755,f=0644 /srv/www".into(),
            source: webperm_fs::Error::io(
                "/srv/www/index.php",
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ),
        };

        let display = error.to_string();
        assert!(display.contains("CodeTree"), "got: {display}");
        assert!(display.contains("chmod -R"), "got: {display}");
    }

    #[test]
    fn path_not_found_displays_path() {
        let error = Error::PathNotFound {
            path: PathBuf::from("/srv/missing"),
        };
        assert!(error.to_string().contains("/srv/missing"));
    }
}
