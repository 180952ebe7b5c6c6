//! Reconciler for bringing path classes to their desired state
//!
//! This module provides:
//! - **reconciler**: precondition checks and plan execution
//! - **report**: applied actions, tolerated failures and change counts

mod reconciler;
mod report;

pub use reconciler::Reconciler;
pub use report::{AppliedAction, ReconcileOptions, ReconcileReport, ToleratedFailure};
