//! Drift detection against the state model
//!
//! The [`Checker`] reads ownership, modes and ACLs and reports, per path
//! class, what is missing or differs from the desired state. It never
//! mutates anything.

use std::path::Path;

use serde::{Deserialize, Serialize};
use webperm_fs::{AclGrant, AclKind, EntryKind, Mode, PathMeta, PermissionOps, TreeScope, format_bits};

use crate::model::{Desired, Ownership, PathClass, PathClassKind, StateModel};
use crate::Result;

/// Status of a drift check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    /// Every path class is in its desired state
    Healthy,
    /// Some managed paths or accounts do not exist
    Missing,
    /// Some managed paths differ from their desired state
    Drifted,
}

/// A path that is missing or has drifted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftItem {
    pub class: PathClassKind,
    pub path: String,
    /// Human-readable description of the drift
    pub description: String,
}

/// Report from a drift check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub status: CheckStatus,
    pub drifted: Vec<DriftItem>,
    pub missing: Vec<DriftItem>,
}

impl CheckReport {
    pub fn healthy() -> Self {
        Self {
            status: CheckStatus::Healthy,
            drifted: Vec::new(),
            missing: Vec::new(),
        }
    }

    pub fn with_missing(missing: Vec<DriftItem>) -> Self {
        Self {
            status: CheckStatus::Missing,
            drifted: Vec::new(),
            missing,
        }
    }

    pub fn with_drifted(drifted: Vec<DriftItem>) -> Self {
        Self {
            status: CheckStatus::Drifted,
            drifted,
            missing: Vec::new(),
        }
    }

    /// Merge two reports. The status is the worse of the two:
    /// Drifted > Missing > Healthy
    pub fn merge(mut self, other: CheckReport) -> Self {
        self.drifted.extend(other.drifted);
        self.missing.extend(other.missing);

        self.status = match (self.status, other.status) {
            (CheckStatus::Drifted, _) | (_, CheckStatus::Drifted) => CheckStatus::Drifted,
            (CheckStatus::Missing, _) | (_, CheckStatus::Missing) => CheckStatus::Missing,
            (CheckStatus::Healthy, CheckStatus::Healthy) => CheckStatus::Healthy,
        };

        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == CheckStatus::Healthy
    }
}

/// Read-only comparison of live state against a [`StateModel`].
pub struct Checker<'a, O: PermissionOps + ?Sized> {
    ops: &'a O,
}

impl<'a, O: PermissionOps + ?Sized> Checker<'a, O> {
    pub fn new(ops: &'a O) -> Self {
        Self { ops }
    }

    pub fn check(&self, model: &StateModel) -> Result<CheckReport> {
        let mut report = CheckReport::healthy();
        for class in &model.classes {
            report = report.merge(self.check_class(class)?);
        }
        Ok(report)
    }

    fn check_class(&self, class: &PathClass) -> Result<CheckReport> {
        let kind = class.kind();
        let path = class.path.as_path();
        let Some(meta) = self.ops.stat(path)? else {
            return Ok(CheckReport::with_missing(vec![item(kind, path, "does not exist")]));
        };

        let mut drift = Vec::new();
        let mut missing = Vec::new();
        match &class.desired {
            Desired::SharedHomeRoot {
                code_owner,
                traverse,
            } => {
                match self.ops.lookup_identity(&code_owner.name)? {
                    None => missing.push(item(
                        kind,
                        path,
                        &format!("user {} does not exist", code_owner.name),
                    )),
                    Some(identity) if !code_owner.is_satisfied_by(&identity) => drift.push(item(
                        kind,
                        path,
                        &format!(
                            "user {} has home {}, shell {}, group {}",
                            identity.name,
                            identity.home.display(),
                            identity.shell.display(),
                            identity.primary_group
                        ),
                    )),
                    Some(_) => {}
                }
                for acl in [AclKind::Access, AclKind::Default] {
                    if let Some(d) = self.grant_drift(kind, path, &meta, traverse, acl)? {
                        drift.push(d);
                    }
                }
            }
            Desired::ScriptsDir { ownership, mode } => {
                drift.extend(ownership_drift(kind, path, &meta, ownership));
                if meta.mode != *mode {
                    drift.push(mode_drift(kind, path, meta.mode, *mode));
                }
            }
            Desired::DotResource { .. } => {}
            Desired::CodeTree {
                ownership,
                modes,
                runtime_user,
                exclude,
            } => {
                let outside = TreeScope::recursive().excluding(exclude.iter().cloned());
                for entry in self.ops.walk(path, &TreeScope::recursive())? {
                    let Some(meta) = self.ops.stat(&entry)? else {
                        continue;
                    };
                    drift.extend(ownership_drift(kind, &entry, &meta, ownership));
                    if outside.excludes(&entry) {
                        continue;
                    }
                    match modes.mode_for(meta.kind) {
                        Some(want) if meta.mode != want => {
                            drift.push(mode_drift(kind, &entry, meta.mode, want));
                        }
                        _ => {}
                    }
                    for acl in acl_kinds(meta.kind) {
                        if let Some(entry_acl) = self
                            .ops
                            .acl_entries(&entry, *acl)?
                            .into_iter()
                            .find(|e| e.is_user(runtime_user))
                        {
                            drift.push(item(
                                kind,
                                &entry,
                                &format!(
                                    "{:?} ACL grants {} {}",
                                    acl,
                                    runtime_user,
                                    format_bits(entry_acl.bits)
                                ),
                            ));
                        }
                    }
                }
            }
            Desired::WritableDir {
                ownership,
                mode,
                grant,
                ..
            } => {
                for entry in self.ops.walk(path, &TreeScope::recursive())? {
                    let Some(meta) = self.ops.stat(&entry)? else {
                        continue;
                    };
                    drift.extend(ownership_drift(kind, &entry, &meta, ownership));
                    let managed = matches!(meta.kind, EntryKind::Dir | EntryKind::File);
                    if managed && meta.mode != *mode {
                        drift.push(mode_drift(kind, &entry, meta.mode, *mode));
                    }
                }
                for acl in [AclKind::Access, AclKind::Default] {
                    if let Some(d) = self.grant_drift(kind, path, &meta, grant, acl)? {
                        drift.push(d);
                    }
                }
            }
        }

        let mut report = CheckReport::healthy();
        if !missing.is_empty() {
            report = report.merge(CheckReport::with_missing(missing));
        }
        if !drift.is_empty() {
            report = report.merge(CheckReport::with_drifted(drift));
        }
        Ok(report)
    }

    /// Drift when the named-user entry of `grant` is absent or differs.
    fn grant_drift(
        &self,
        kind: PathClassKind,
        path: &Path,
        meta: &PathMeta,
        grant: &AclGrant,
        acl: AclKind,
    ) -> Result<Option<DriftItem>> {
        let want = grant.perms.resolve(meta.kind, meta.mode);
        let current = self
            .ops
            .acl_entries(path, acl)?
            .into_iter()
            .find(|e| e.is_user(&grant.user));
        Ok(match current {
            Some(entry) if entry.bits == want => None,
            Some(entry) => Some(item(
                kind,
                path,
                &format!(
                    "{:?} ACL for {} is {}, expected {}",
                    acl,
                    grant.user,
                    format_bits(entry.bits),
                    format_bits(want)
                ),
            )),
            None => Some(item(
                kind,
                path,
                &format!("{:?} ACL entry for {} is missing", acl, grant.user),
            )),
        })
    }
}

fn acl_kinds(kind: EntryKind) -> &'static [AclKind] {
    match kind {
        EntryKind::Dir => &[AclKind::Access, AclKind::Default],
        EntryKind::File => &[AclKind::Access],
        EntryKind::Symlink | EntryKind::Other => &[],
    }
}

fn item(class: PathClassKind, path: &Path, description: &str) -> DriftItem {
    DriftItem {
        class,
        path: path.display().to_string(),
        description: description.to_string(),
    }
}

fn ownership_drift(
    class: PathClassKind,
    path: &Path,
    meta: &PathMeta,
    want: &Ownership,
) -> Option<DriftItem> {
    (meta.owner != want.owner || meta.group != want.group).then(|| {
        item(
            class,
            path,
            &format!(
                "owned by {}:{}, expected {}:{}",
                meta.owner, meta.group, want.owner, want.group
            ),
        )
    })
}

fn mode_drift(class: PathClassKind, path: &Path, have: Mode, want: Mode) -> DriftItem {
    item(class, path, &format!("mode {have}, expected {want}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drift(file: &str) -> DriftItem {
        DriftItem {
            class: PathClassKind::CodeTree,
            path: file.to_string(),
            description: "mode 0666, expected 0644".to_string(),
        }
    }

    #[test]
    fn healthy_report_is_empty() {
        let report = CheckReport::healthy();
        assert!(report.is_healthy());
        assert!(report.drifted.is_empty());
        assert!(report.missing.is_empty());
    }

    #[test]
    fn merge_takes_worst_status() {
        let merged = CheckReport::with_missing(vec![drift("/a")])
            .merge(CheckReport::with_drifted(vec![drift("/b")]));
        assert_eq!(merged.status, CheckStatus::Drifted);
        assert_eq!(merged.missing.len(), 1);
        assert_eq!(merged.drifted.len(), 1);

        let merged = CheckReport::healthy().merge(CheckReport::with_missing(vec![drift("/a")]));
        assert_eq!(merged.status, CheckStatus::Missing);
    }

    #[test]
    fn merge_healthy_with_healthy_stays_healthy() {
        let merged = CheckReport::healthy().merge(CheckReport::healthy());
        assert_eq!(merged.status, CheckStatus::Healthy);
    }
}
