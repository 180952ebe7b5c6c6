//! Report types for reconciliation runs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::PathClassKind;
use crate::plan::Action;

/// Options for reconcile and replay
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// If true, report every action without executing any.
    pub dry_run: bool,
}

/// An action the run executed (or, in a dry run, would execute)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedAction {
    pub class: PathClassKind,
    pub action: Action,
    /// Entries this action actually changed; always 0 in a dry run
    pub changed: usize,
}

/// A refused ACL call that did not abort the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToleratedFailure {
    pub class: PathClassKind,
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a reconcile or replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub dry_run: bool,
    /// Every action attempted, in plan order
    pub applied: Vec<AppliedAction>,
    pub tolerated: Vec<ToleratedFailure>,
}

impl ReconcileReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            applied: Vec::new(),
            tolerated: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, class: PathClassKind, action: &Action, changed: usize) {
        self.applied.push(AppliedAction {
            class,
            action: action.clone(),
            changed,
        });
    }

    pub(crate) fn tolerate(&mut self, class: PathClassKind, path: PathBuf, error: String) {
        self.tolerated.push(ToleratedFailure { class, path, error });
    }

    /// Total number of entries changed across all actions.
    pub fn effective_changes(&self) -> usize {
        self.applied.iter().map(|a| a.changed).sum()
    }

    /// The bare action list, for comparing runs.
    pub fn actions(&self) -> Vec<&Action> {
        self.applied.iter().map(|a| &a.action).collect()
    }
}
