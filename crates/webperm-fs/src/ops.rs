//! The filesystem-identity capability interface.
//!
//! [`PermissionOps`] is the only way webperm touches accounts, ownership,
//! modes and ACLs. Implementors supply per-entry primitives; the recursive
//! operations are provided on top of them so every backend counts changes
//! the same way: an entry is only touched when its current state differs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::perms::{AclEdit, AclEntry, AclGrant, AclKind, EntryKind, Mode, ModeRule, TreeScope};
use crate::Result;

/// A resolved account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    /// Name of the primary group
    pub primary_group: String,
    pub home: PathBuf,
    pub shell: PathBuf,
}

/// A resolved group record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub name: String,
    pub gid: u32,
    /// Supplementary members
    pub members: Vec<String>,
}

impl GroupInfo {
    pub fn has_member(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }
}

/// Attributes an account must end up with after `ensure_identity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySpec {
    pub name: String,
    pub home: PathBuf,
    pub shell: PathBuf,
    /// Primary group
    pub group: String,
}

impl IdentitySpec {
    /// Whether an existing account already satisfies this spec.
    pub fn is_satisfied_by(&self, identity: &Identity) -> bool {
        identity.home == self.home
            && identity.shell == self.shell
            && identity.primary_group == self.group
    }
}

/// Ownership and mode of one entry, with owner and group as names.
///
/// Ids without a passwd/group entry are reported as their decimal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMeta {
    pub kind: EntryKind,
    pub owner: String,
    pub group: String,
    pub mode: Mode,
}

/// Capability interface over privileged filesystem and account operations.
pub trait PermissionOps: Send + Sync {
    /// Look up an account by name.
    fn lookup_identity(&self, name: &str) -> Result<Option<Identity>>;

    /// Look up a group by name.
    fn lookup_group(&self, name: &str) -> Result<Option<GroupInfo>>;

    /// Create the account, or correct its home/shell/primary group.
    ///
    /// Returns `true` if anything changed.
    fn ensure_identity(&self, spec: &IdentitySpec) -> Result<bool>;

    /// Metadata of `path` without following symlinks; `None` if absent.
    fn stat(&self, path: &Path) -> Result<Option<PathMeta>>;

    /// Entries under `root` in walk order, root first.
    ///
    /// Symlinks are listed but never followed, including a symlinked root,
    /// which is returned alone. A missing root yields an empty list.
    fn walk(&self, root: &Path, scope: &TreeScope) -> Result<Vec<PathBuf>>;

    /// Create a directory if absent. Returns `true` if it was created.
    fn create_dir(&self, path: &Path, owner: &str, group: &str, mode: Mode) -> Result<bool>;

    /// Create an empty file if absent. Returns `true` if it was created.
    fn create_file(&self, path: &Path, owner: &str, group: &str, mode: Mode) -> Result<bool>;

    /// Write `contents` to `path` with the given ownership and mode.
    ///
    /// Returns `false` when content and metadata were already identical.
    fn write_file(
        &self,
        path: &Path,
        contents: &[u8],
        owner: &str,
        group: &str,
        mode: Mode,
    ) -> Result<bool>;

    /// Read a whole file.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Change owner and group of one entry (symlinks themselves, not targets).
    fn set_owner(&self, path: &Path, owner: &str, group: &str) -> Result<()>;

    /// Change the mode of one entry.
    fn set_mode(&self, path: &Path, mode: Mode) -> Result<()>;

    /// Named entries of the access or default ACL.
    fn acl_entries(&self, path: &Path, kind: AclKind) -> Result<Vec<AclEntry>>;

    /// Read-only check that `path` lives on a filesystem with ACL support.
    ///
    /// Unlike [`acl_entries`](Self::acl_entries), missing support is an
    /// error here rather than an empty list.
    fn acl_supported(&self, path: &Path) -> Result<()>;

    /// Apply one edit to one entry's ACL, leaving every other entry alone.
    ///
    /// Returns `true` if the ACL changed.
    fn update_acl(&self, path: &Path, kind: AclKind, edit: &AclEdit) -> Result<bool>;

    /// Recursive chown. Returns the number of entries changed.
    fn chown_recursive(
        &self,
        path: &Path,
        owner: &str,
        group: &str,
        scope: &TreeScope,
    ) -> Result<usize> {
        let mut changed = 0;
        for entry in self.walk(path, scope)? {
            let Some(meta) = self.stat(&entry)? else {
                continue;
            };
            if meta.owner != owner || meta.group != group {
                debug!(path = %entry.display(), from = %format!("{}:{}", meta.owner, meta.group), "chown");
                self.set_owner(&entry, owner, group)?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Recursive chmod with independent directory and file modes.
    ///
    /// Returns the number of entries changed.
    fn chmod_recursive(&self, path: &Path, rule: &ModeRule, scope: &TreeScope) -> Result<usize> {
        let mut changed = 0;
        for entry in self.walk(path, scope)? {
            let Some(meta) = self.stat(&entry)? else {
                continue;
            };
            let Some(mode) = rule.mode_for(meta.kind) else {
                continue;
            };
            if meta.mode != mode {
                debug!(path = %entry.display(), from = %meta.mode, to = %mode, "chmod");
                self.set_mode(&entry, mode)?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Grant a named-user access ACL entry. Returns the number of entries changed.
    fn set_acl(&self, path: &Path, grant: &AclGrant, scope: &TreeScope) -> Result<usize> {
        apply_grant(self, path, grant, AclKind::Access, scope)
    }

    /// Grant a named-user default ACL entry on directories.
    ///
    /// Returns the number of directories changed.
    fn set_default_acl(&self, path: &Path, grant: &AclGrant, scope: &TreeScope) -> Result<usize> {
        apply_grant(self, path, grant, AclKind::Default, scope)
    }

    /// Drop a named-user entry from access and default ACLs.
    ///
    /// Returns the number of entries whose ACL changed.
    fn remove_acl(&self, path: &Path, user: &str, scope: &TreeScope) -> Result<usize> {
        let mut changed = 0;
        let edit = AclEdit::Revoke {
            user: user.to_string(),
        };
        for entry in self.walk(path, scope)? {
            let Some(meta) = self.stat(&entry)? else {
                continue;
            };
            let kinds: &[AclKind] = match meta.kind {
                EntryKind::Dir => &[AclKind::Access, AclKind::Default],
                EntryKind::File => &[AclKind::Access],
                EntryKind::Symlink | EntryKind::Other => continue,
            };
            let mut touched = false;
            for kind in kinds {
                let present = self
                    .acl_entries(&entry, *kind)?
                    .iter()
                    .any(|e| e.is_user(user));
                if present {
                    touched |= self.update_acl(&entry, *kind, &edit)?;
                }
            }
            if touched {
                debug!(path = %entry.display(), user, "removed ACL entry");
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Check that ACLs can be written on `path`.
    ///
    /// Sets a `---` entry for `user` and clears it again. If `user` already
    /// has an entry it is re-set to its current value instead, so the probe
    /// never disturbs existing grants.
    fn probe_acl(&self, path: &Path, user: &str) -> Result<()> {
        let existing = self
            .acl_entries(path, AclKind::Access)?
            .into_iter()
            .find(|e| e.is_user(user));
        match existing {
            Some(entry) => {
                self.update_acl(
                    path,
                    AclKind::Access,
                    &AclEdit::Grant {
                        user: user.to_string(),
                        bits: entry.bits,
                    },
                )?;
            }
            None => {
                self.update_acl(
                    path,
                    AclKind::Access,
                    &AclEdit::Grant {
                        user: user.to_string(),
                        bits: 0,
                    },
                )?;
                self.update_acl(
                    path,
                    AclKind::Access,
                    &AclEdit::Revoke {
                        user: user.to_string(),
                    },
                )?;
            }
        }
        Ok(())
    }
}

fn apply_grant<O: PermissionOps + ?Sized>(
    ops: &O,
    path: &Path,
    grant: &AclGrant,
    kind: AclKind,
    scope: &TreeScope,
) -> Result<usize> {
    let mut changed = 0;
    for entry in ops.walk(path, scope)? {
        let Some(meta) = ops.stat(&entry)? else {
            continue;
        };
        match (meta.kind, kind) {
            (EntryKind::Dir, _) | (EntryKind::File, AclKind::Access) => {}
            _ => continue,
        }
        let bits = grant.perms.resolve(meta.kind, meta.mode);
        let current = ops
            .acl_entries(&entry, kind)?
            .into_iter()
            .find(|e| e.is_user(&grant.user));
        if current.is_some_and(|e| e.bits == bits) {
            continue;
        }
        let edit = AclEdit::Grant {
            user: grant.user.clone(),
            bits,
        };
        if ops.update_acl(&entry, kind, &edit)? {
            debug!(path = %entry.display(), grant = %grant, ?kind, "set ACL entry");
            changed += 1;
        }
    }
    Ok(changed)
}
