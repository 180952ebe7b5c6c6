//! Plan execution with precondition checks and failure classification

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use webperm_fs::{EntryKind, PermissionOps};

use crate::model::{PathClassKind, StateModel};
use crate::plan::{Action, Plan};
use crate::{Error, Result};

use super::report::{ReconcileOptions, ReconcileReport};

/// Executes plans against a [`PermissionOps`] backend.
///
/// Preconditions are checked before the first mutation. After that, every
/// failure aborts the run except a refused ACL call inside a step marked
/// `tolerate_acl_denied`, which is recorded and skipped.
pub struct Reconciler<'a, O: PermissionOps + ?Sized> {
    ops: &'a O,
}

impl<'a, O: PermissionOps + ?Sized> Reconciler<'a, O> {
    pub fn new(ops: &'a O) -> Self {
        Self { ops }
    }

    /// Bring every path class of `model` to its desired state.
    pub fn reconcile(
        &self,
        model: &StateModel,
        options: &ReconcileOptions,
    ) -> Result<ReconcileReport> {
        self.run(&Plan::from_model(model), options)
    }

    /// Execute `plan` step by step.
    ///
    /// # Errors
    ///
    /// Precondition failures return [`Error::PathNotFound`],
    /// [`Error::IdentityMissing`], [`Error::GroupMissing`],
    /// [`Error::SymlinkedPath`] or [`Error::AclUnsupported`] before anything
    /// is changed. A fatal mutation failure returns [`Error::ApplyFailed`]
    /// naming the class. A refused ACL that group bits cannot replace returns
    /// [`Error::GroupFallbackUnavailable`].
    pub fn run(&self, plan: &Plan, options: &ReconcileOptions) -> Result<ReconcileReport> {
        let runtime_in_group = self.check_preconditions(plan, options.dry_run)?;

        let mut report = ReconcileReport::new(options.dry_run);
        for step in &plan.steps {
            info!(class = %step.class, path = %step.path.display(), "reconciling");
            for action in &step.actions {
                if options.dry_run {
                    info!("[dry-run] Would {}", action);
                    report.record(step.class, action, 0);
                    continue;
                }

                debug!(class = %step.class, "{}", action);
                match self.execute(action) {
                    Ok(changed) => report.record(step.class, action, changed),
                    Err(err)
                        if step.tolerate_acl_denied && action.is_acl() && err.is_acl_denied() =>
                    {
                        let path = failed_path(&err, &step.path);
                        if !runtime_in_group {
                            return Err(Error::GroupFallbackUnavailable {
                                path,
                                user: plan.params.runtime_user.clone(),
                                group: plan.params.shared_group.clone(),
                            });
                        }
                        warn!(
                            class = %step.class,
                            path = %path.display(),
                            error = %err,
                            "ACL refused, relying on group-sticky mode bits"
                        );
                        report.record(step.class, action, 0);
                        report.tolerate(step.class, path, err.to_string());
                    }
                    Err(source) => {
                        return Err(Error::ApplyFailed {
                            class: step.class,
                            action: action.to_string(),
                            source,
                        });
                    }
                }
            }
        }

        info!(
            changes = report.effective_changes(),
            tolerated = report.tolerated.len(),
            dry_run = options.dry_run,
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Returns whether the runtime user belongs to the shared group.
    fn check_preconditions(&self, plan: &Plan, dry_run: bool) -> Result<bool> {
        let params = &plan.params;
        self.require_dir(&params.document_root)?;

        let runtime = self
            .ops
            .lookup_identity(&params.runtime_user)?
            .ok_or_else(|| Error::IdentityMissing {
                name: params.runtime_user.clone(),
            })?;

        let group = self
            .ops
            .lookup_group(&params.shared_group)?
            .ok_or_else(|| Error::GroupMissing {
                name: params.shared_group.clone(),
            })?;

        let runtime_in_group =
            runtime.primary_group == group.name || group.has_member(&runtime.name);
        if !runtime_in_group {
            warn!(
                user = %runtime.name,
                group = %group.name,
                "runtime user is not a member of the shared group"
            );
        }
        if runtime.home != params.shared_home {
            warn!(
                user = %runtime.name,
                home = %runtime.home.display(),
                expected = %params.shared_home.display(),
                "runtime user's home differs from the shared home"
            );
        }

        let home = &params.shared_home;
        self.require_dir(home)?;

        for step in plan.steps.iter().filter(|s| s.class == PathClassKind::WritableDir) {
            self.refuse_symlinks(&params.document_root, &step.path)?;
        }

        // A live probe sets and clears an entry. A dry run only reads, since
        // a set/clear pair can leave a recomputed mask behind.
        let probe = if dry_run {
            self.ops.acl_supported(home)
        } else {
            self.ops.probe_acl(home, &params.runtime_user)
        };
        probe.map_err(|e| Error::AclUnsupported {
            path: home.clone(),
            reason: e.to_string(),
        })?;

        debug!(runtime = %runtime.name, group = %group.name, "preconditions satisfied");
        Ok(runtime_in_group)
    }

    /// Fail if `path` or any existing ancestor below `root` is a symlink.
    fn refuse_symlinks(&self, root: &Path, path: &Path) -> Result<()> {
        let Ok(relative) = path.strip_prefix(root) else {
            return Ok(());
        };
        let mut current = root.to_path_buf();
        for component in relative.components() {
            current.push(component);
            match self.ops.stat(&current)? {
                Some(meta) if meta.kind == EntryKind::Symlink => {
                    return Err(Error::SymlinkedPath { path: current });
                }
                Some(_) => {}
                None => break,
            }
        }
        Ok(())
    }

    fn require_dir(&self, path: &Path) -> Result<()> {
        match self.ops.stat(path)? {
            Some(meta) if meta.kind == EntryKind::Dir => Ok(()),
            _ => Err(Error::PathNotFound {
                path: path.to_path_buf(),
            }),
        }
    }

    fn execute(&self, action: &Action) -> webperm_fs::Result<usize> {
        let ops = self.ops;
        match action {
            Action::EnsureIdentity { identity } => Ok(ops.ensure_identity(identity)? as usize),
            Action::CreateDir {
                path,
                owner,
                group,
                mode,
                parents,
            } => {
                let mut created = 0;
                if let Some(parent_mode) = parents {
                    for ancestor in missing_ancestors(ops, path)? {
                        created += ops.create_dir(&ancestor, owner, group, *parent_mode)? as usize;
                    }
                }
                created += ops.create_dir(path, owner, group, *mode)? as usize;
                Ok(created)
            }
            Action::CreateFile {
                path,
                owner,
                group,
                mode,
            } => Ok(ops.create_file(path, owner, group, *mode)? as usize),
            Action::Chown {
                path,
                owner,
                group,
                scope,
            } => ops.chown_recursive(path, owner, group, scope),
            Action::Chmod { path, rule, scope } => ops.chmod_recursive(path, rule, scope),
            Action::SetAcl { path, grant, scope } => ops.set_acl(path, grant, scope),
            Action::SetDefaultAcl { path, grant, scope } => {
                ops.set_default_acl(path, grant, scope)
            }
            Action::RemoveAcl { path, user, scope } => ops.remove_acl(path, user, scope),
        }
    }
}

/// Ancestors of `path` that do not exist yet, outermost first.
fn missing_ancestors<O: PermissionOps + ?Sized>(
    ops: &O,
    path: &Path,
) -> webperm_fs::Result<Vec<PathBuf>> {
    let mut missing = Vec::new();
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() || ops.stat(ancestor)?.is_some() {
            break;
        }
        missing.push(ancestor.to_path_buf());
    }
    missing.reverse();
    Ok(missing)
}

fn failed_path(err: &webperm_fs::Error, fallback: &Path) -> PathBuf {
    match err {
        webperm_fs::Error::Acl { path, .. } | webperm_fs::Error::Io { path, .. } => path.clone(),
        _ => fallback.to_path_buf(),
    }
}
