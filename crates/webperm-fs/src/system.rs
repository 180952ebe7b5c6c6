//! [`PermissionOps`] backed by the running host.
//!
//! Lookups use the passwd/group databases through `nix`, ownership goes
//! through `lchown`, and ACLs are read and written with `exacl`. Creating or
//! modifying an account is delegated to the distribution's `useradd` and
//! `usermod`: account lifecycle is owned by the host, not by webperm.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::{MetadataExt, PermissionsExt, lchown};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use exacl::{AclEntryKind, AclOption, Flag, Perm};
use nix::errno::Errno;
use nix::unistd::{Gid, Group, Uid, User};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::ops::{GroupInfo, Identity, IdentitySpec, PathMeta, PermissionOps};
use crate::perms::{AclEdit, AclEntry, AclKind, EntryKind, Mode, Qualifier, TreeScope};
use crate::{Error, Result, io};

#[derive(Debug, Default)]
struct NameCache {
    users: HashMap<u32, String>,
    groups: HashMap<u32, String>,
}

/// Host-backed permission operations.
#[derive(Debug, Default)]
pub struct SystemOps {
    names: Mutex<NameCache>,
}

impl SystemOps {
    pub fn new() -> Self {
        Self::default()
    }

    fn user_name(&self, uid: u32) -> String {
        let mut cache = self.names.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .users
            .entry(uid)
            .or_insert_with(|| {
                User::from_uid(Uid::from_raw(uid))
                    .ok()
                    .flatten()
                    .map(|u| u.name)
                    .unwrap_or_else(|| uid.to_string())
            })
            .clone()
    }

    fn group_name(&self, gid: u32) -> String {
        let mut cache = self.names.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .groups
            .entry(gid)
            .or_insert_with(|| {
                Group::from_gid(Gid::from_raw(gid))
                    .ok()
                    .flatten()
                    .map(|g| g.name)
                    .unwrap_or_else(|| gid.to_string())
            })
            .clone()
    }

    // Names that came back from `stat` as bare ids resolve to themselves
    fn resolve_uid(&self, name: &str) -> Result<u32> {
        User::from_name(name)
            .ok()
            .flatten()
            .map(|u| u.uid.as_raw())
            .or_else(|| name.parse().ok())
            .ok_or_else(|| Error::UnknownIdentity {
                name: name.to_string(),
            })
    }

    fn resolve_gid(&self, name: &str) -> Result<u32> {
        Group::from_name(name)
            .ok()
            .flatten()
            .map(|g| g.gid.as_raw())
            .or_else(|| name.parse().ok())
            .ok_or_else(|| Error::UnknownGroup {
                name: name.to_string(),
            })
    }

    fn run_account_tool(&self, tool: &str, args: &[&OsStr], name: &str) -> Result<()> {
        info!(tool, name, "modifying account");
        let output = Command::new(tool)
            .args(args)
            .arg(name)
            .output()
            .map_err(|e| Error::Account {
                name: name.to_string(),
                message: format!("failed to launch {tool}: {e}"),
            })?;
        if !output.status.success() {
            return Err(Error::Account {
                name: name.to_string(),
                message: format!(
                    "{tool} exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

impl PermissionOps for SystemOps {
    fn lookup_identity(&self, name: &str) -> Result<Option<Identity>> {
        let user = User::from_name(name).map_err(|e| Error::Account {
            name: name.to_string(),
            message: format!("passwd lookup failed: {e}"),
        })?;
        Ok(user.map(|u| {
            let gid = u.gid.as_raw();
            Identity {
                primary_group: self.group_name(gid),
                name: u.name,
                uid: u.uid.as_raw(),
                gid,
                home: u.dir,
                shell: u.shell,
            }
        }))
    }

    fn lookup_group(&self, name: &str) -> Result<Option<GroupInfo>> {
        let group = Group::from_name(name).map_err(|e| Error::Account {
            name: name.to_string(),
            message: format!("group lookup failed: {e}"),
        })?;
        Ok(group.map(|g| GroupInfo {
            name: g.name,
            gid: g.gid.as_raw(),
            members: g.mem,
        }))
    }

    fn ensure_identity(&self, spec: &IdentitySpec) -> Result<bool> {
        let args: [&OsStr; 6] = [
            OsStr::new("-d"),
            spec.home.as_os_str(),
            OsStr::new("-s"),
            spec.shell.as_os_str(),
            OsStr::new("-g"),
            OsStr::new(&spec.group),
        ];
        match self.lookup_identity(&spec.name)? {
            Some(identity) if spec.is_satisfied_by(&identity) => Ok(false),
            Some(_) => {
                self.run_account_tool("usermod", &args, &spec.name)?;
                Ok(true)
            }
            None => {
                let mut create = args.to_vec();
                // The shared home already exists and belongs to the runtime identity
                create.push(OsStr::new("-M"));
                self.run_account_tool("useradd", &create, &spec.name)?;
                Ok(true)
            }
        }
    }

    fn stat(&self, path: &Path) -> Result<Option<PathMeta>> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(path, e)),
        };
        let file_type = meta.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        Ok(Some(PathMeta {
            kind,
            owner: self.user_name(meta.uid()),
            group: self.group_name(meta.gid()),
            mode: Mode::new(meta.mode()),
        }))
    }

    fn walk(&self, root: &Path, scope: &TreeScope) -> Result<Vec<PathBuf>> {
        match fs::symlink_metadata(root) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(root, e)),
        }
        let mut walker = WalkDir::new(root)
            .follow_links(false)
            .follow_root_links(false)
            .sort_by_file_name();
        if !scope.recursive {
            walker = walker.max_depth(0);
        }
        walker
            .into_iter()
            .filter_entry(|entry| !scope.excludes(entry.path()))
            .map(|entry| match entry {
                Ok(entry) => Ok(entry.into_path()),
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    Err(Error::io(path, std::io::Error::from(e)))
                }
            })
            .collect()
    }

    fn create_dir(&self, path: &Path, owner: &str, group: &str, mode: Mode) -> Result<bool> {
        match fs::create_dir(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(Error::io(path, e)),
        }
        self.set_owner(path, owner, group)?;
        self.set_mode(path, mode)?;
        debug!(path = %path.display(), %mode, "created directory");
        Ok(true)
    }

    fn create_file(&self, path: &Path, owner: &str, group: &str, mode: Mode) -> Result<bool> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(Error::io(path, e)),
        }
        self.set_owner(path, owner, group)?;
        self.set_mode(path, mode)?;
        debug!(path = %path.display(), %mode, "created file");
        Ok(true)
    }

    fn write_file(
        &self,
        path: &Path,
        contents: &[u8],
        owner: &str,
        group: &str,
        mode: Mode,
    ) -> Result<bool> {
        if let Some(meta) = self.stat(path)?
            && meta.kind == EntryKind::File
            && meta.owner == owner
            && meta.group == group
            && meta.mode == mode
            && self.read_file(path)? == contents
        {
            return Ok(false);
        }
        io::write_atomic(path, contents, mode)?;
        self.set_owner(path, owner, group)?;
        Ok(true)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| Error::io(path, e))
    }

    fn set_owner(&self, path: &Path, owner: &str, group: &str) -> Result<()> {
        let uid = self.resolve_uid(owner)?;
        let gid = self.resolve_gid(group)?;
        lchown(path, Some(uid), Some(gid)).map_err(|e| Error::io(path, e))
    }

    fn set_mode(&self, path: &Path, mode: Mode) -> Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode.bits()))
            .map_err(|e| Error::io(path, e))
    }

    fn acl_entries(&self, path: &Path, kind: AclKind) -> Result<Vec<AclEntry>> {
        let entries = match exacl::getfacl(path, AclOption::empty()) {
            Ok(entries) => entries,
            // No ACL support means no ACL entries
            Err(e) if e.raw_os_error() == Some(Errno::EOPNOTSUPP as i32) => return Ok(Vec::new()),
            Err(e) => return Err(Error::acl(path, e)),
        };
        Ok(entries
            .iter()
            .filter(|e| is_default(e) == (kind == AclKind::Default))
            .filter_map(named_entry)
            .collect())
    }

    fn acl_supported(&self, path: &Path) -> Result<()> {
        exacl::getfacl(path, AclOption::empty())
            .map(|_| ())
            .map_err(|e| Error::acl(path, e))
    }

    fn update_acl(&self, path: &Path, kind: AclKind, edit: &AclEdit) -> Result<bool> {
        let entries = exacl::getfacl(path, AclOption::empty()).map_err(|e| Error::acl(path, e))?;
        let (mut access, mut default): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|e| !is_default(e));

        if kind == AclKind::Default && default.is_empty() {
            if matches!(edit, AclEdit::Revoke { .. }) {
                return Ok(false);
            }
            // A default ACL needs the base entries before any named entry
            default = access
                .iter()
                .filter(|e| e.name.is_empty() && e.kind != AclEntryKind::Mask)
                .cloned()
                .map(|mut e| {
                    e.flags = Flag::DEFAULT;
                    e
                })
                .collect();
        }

        let (target, flags) = match kind {
            AclKind::Access => (&mut access, Flag::empty()),
            AclKind::Default => (&mut default, Flag::DEFAULT),
        };
        if !apply_edit(target, edit, flags) {
            return Ok(false);
        }
        recompute_mask(target, flags);

        // A default ACL without named entries would still override the umask
        let drop_default = kind == AclKind::Default && !default.iter().any(is_named);
        if drop_default {
            default.clear();
        }
        access.extend(default);
        exacl::setfacl(&[path], &access, AclOption::empty()).map_err(|e| Error::acl(path, e))?;
        if drop_default {
            exacl::setfacl(&[path], &[], AclOption::DEFAULT_ACL).map_err(|e| Error::acl(path, e))?;
        }
        Ok(true)
    }
}

fn is_default(entry: &exacl::AclEntry) -> bool {
    entry.flags.contains(Flag::DEFAULT)
}

fn is_named(entry: &exacl::AclEntry) -> bool {
    !entry.name.is_empty() && matches!(entry.kind, AclEntryKind::User | AclEntryKind::Group)
}

fn named_entry(entry: &exacl::AclEntry) -> Option<AclEntry> {
    if entry.name.is_empty() || !entry.allow {
        return None;
    }
    let qualifier = match entry.kind {
        AclEntryKind::User => Qualifier::User(entry.name.clone()),
        AclEntryKind::Group => Qualifier::Group(entry.name.clone()),
        _ => return None,
    };
    Some(AclEntry {
        qualifier,
        bits: perm_to_bits(entry.perms),
    })
}

fn perm_to_bits(perms: Perm) -> u8 {
    let mut bits = 0;
    if perms.contains(Perm::READ) {
        bits |= 4;
    }
    if perms.contains(Perm::WRITE) {
        bits |= 2;
    }
    if perms.contains(Perm::EXECUTE) {
        bits |= 1;
    }
    bits
}

fn bits_to_perm(bits: u8) -> Perm {
    let mut perms = Perm::empty();
    if bits & 4 != 0 {
        perms |= Perm::READ;
    }
    if bits & 2 != 0 {
        perms |= Perm::WRITE;
    }
    if bits & 1 != 0 {
        perms |= Perm::EXECUTE;
    }
    perms
}

fn is_named_user(entry: &exacl::AclEntry, user: &str) -> bool {
    entry.kind == AclEntryKind::User && entry.allow && entry.name == user
}

fn apply_edit(entries: &mut Vec<exacl::AclEntry>, edit: &AclEdit, flags: Flag) -> bool {
    match edit {
        AclEdit::Grant { user, bits } => {
            let perms = bits_to_perm(*bits);
            match entries.iter_mut().find(|e| is_named_user(e, user)) {
                Some(entry) if entry.perms == perms => false,
                Some(entry) => {
                    entry.perms = perms;
                    true
                }
                None => {
                    entries.push(exacl::AclEntry::allow_user(user, perms, flags));
                    true
                }
            }
        }
        AclEdit::Revoke { user } => {
            let before = entries.len();
            entries.retain(|e| !is_named_user(e, user));
            entries.len() != before
        }
    }
}

/// Recalculate the mask the way `setfacl -m` does: the union of the group
/// class. An ACL left with no named entries drops its mask.
fn recompute_mask(entries: &mut Vec<exacl::AclEntry>, flags: Flag) {
    if !entries.iter().any(is_named) {
        entries.retain(|e| e.kind != AclEntryKind::Mask);
        return;
    }
    let union = entries
        .iter()
        .filter(|e| {
            e.kind == AclEntryKind::Group
                || (e.kind == AclEntryKind::User && !e.name.is_empty())
        })
        .fold(Perm::empty(), |acc, e| acc | e.perms);
    match entries.iter_mut().find(|e| e.kind == AclEntryKind::Mask) {
        Some(mask) => mask.perms = union,
        None => entries.push(exacl::AclEntry::allow_mask(union, flags)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perms::{AclGrant, AclPerms};
    use std::fs;
    use tempfile::TempDir;

    fn current_names(ops: &SystemOps) -> (String, String) {
        let uid = nix::unistd::geteuid().as_raw();
        let gid = nix::unistd::getegid().as_raw();
        (ops.user_name(uid), ops.group_name(gid))
    }

    #[test]
    fn stat_reports_kind_and_mode() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("index.php");
        fs::write(&file, "<?php").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o640)).unwrap();

        let ops = SystemOps::new();
        let meta = ops.stat(&file).unwrap().unwrap();
        assert_eq!(meta.kind, EntryKind::File);
        assert_eq!(meta.mode, Mode::new(0o640));
        assert!(ops.stat(&temp.path().join("missing")).unwrap().is_none());
    }

    #[test]
    fn chmod_recursive_counts_only_changes() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("www");
        fs::create_dir_all(root.join("wp-includes")).unwrap();
        fs::write(root.join("index.php"), "").unwrap();
        fs::write(root.join("wp-includes/load.php"), "").unwrap();

        let ops = SystemOps::new();
        let rule = crate::ModeRule::split(0o755, 0o644);
        ops.chmod_recursive(&root, &rule, &TreeScope::recursive()).unwrap();

        assert_eq!(ops.stat(&root.join("index.php")).unwrap().unwrap().mode, Mode::new(0o644));
        assert_eq!(ops.stat(&root.join("wp-includes")).unwrap().unwrap().mode, Mode::new(0o755));
        assert_eq!(ops.chmod_recursive(&root, &rule, &TreeScope::recursive()).unwrap(), 0);
    }

    #[test]
    fn walk_prunes_excluded_subtrees() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("wp-content/uploads/2024")).unwrap();
        fs::write(root.join("wp-content/uploads/2024/a.jpg"), "").unwrap();
        fs::write(root.join("wp-content/index.php"), "").unwrap();

        let ops = SystemOps::new();
        let scope = TreeScope::recursive().excluding([root.join("wp-content/uploads")]);
        let walked = ops.walk(root, &scope).unwrap();

        assert_eq!(walked[0], root.to_path_buf());
        assert!(walked.contains(&root.join("wp-content/index.php")));
        assert!(!walked.iter().any(|p| p.starts_with(root.join("wp-content/uploads"))));
    }

    #[test]
    fn walk_of_missing_root_is_empty() {
        let ops = SystemOps::new();
        let walked = ops.walk(Path::new("/nonexistent/webperm"), &TreeScope::recursive()).unwrap();
        assert!(walked.is_empty());
    }

    #[test]
    fn create_file_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let profile = temp.path().join(".bash_profile");
        fs::write(&profile, "export PATH=$HOME/bin:$PATH\n").unwrap();

        let ops = SystemOps::new();
        let (owner, group) = current_names(&ops);
        let created = ops.create_file(&profile, &owner, &group, Mode::new(0o644)).unwrap();

        assert!(!created);
        assert_eq!(fs::read_to_string(&profile).unwrap(), "export PATH=$HOME/bin:$PATH\n");
    }

    #[test]
    fn create_dir_applies_mode_despite_umask() {
        let temp = TempDir::new().unwrap();
        let ssh = temp.path().join(".ssh");

        let ops = SystemOps::new();
        let (owner, group) = current_names(&ops);
        assert!(ops.create_dir(&ssh, &owner, &group, Mode::new(0o700)).unwrap());
        assert!(!ops.create_dir(&ssh, &owner, &group, Mode::new(0o700)).unwrap());
        assert_eq!(ops.stat(&ssh).unwrap().unwrap().mode, Mode::new(0o700));
    }

    #[test]
    fn write_file_is_unchanged_on_identical_rewrite() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("scripts/fix_permissions_example.com");

        let ops = SystemOps::new();
        let (owner, group) = current_names(&ops);
        let mode = Mode::new(0o750);
        assert!(ops.write_file(&artifact, b"plan", &owner, &group, mode).unwrap());
        assert!(!ops.write_file(&artifact, b"plan", &owner, &group, mode).unwrap());
        assert!(ops.write_file(&artifact, b"plan v2", &owner, &group, mode).unwrap());
    }

    #[test]
    fn chown_to_current_owner_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.php"), "").unwrap();

        let ops = SystemOps::new();
        let (owner, group) = current_names(&ops);
        let changed = ops
            .chown_recursive(temp.path(), &owner, &group, &TreeScope::recursive())
            .unwrap();
        assert_eq!(changed, 0);
    }

    fn acl_tree() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("uploads");
        fs::create_dir_all(root.join("2024")).unwrap();
        fs::write(root.join("2024/photo.jpg"), "JPEG").unwrap();
        (temp, root)
    }

    #[test]
    fn second_grant_changes_nothing() {
        let (_temp, root) = acl_tree();
        let ops = SystemOps::new();
        let (owner, _) = current_names(&ops);
        let grant = AclGrant::new(owner.as_str(), AclPerms::READ_WRITE_TRAVERSE);

        assert_eq!(ops.set_acl(&root, &grant, &TreeScope::recursive()).unwrap(), 3);
        assert_eq!(ops.set_acl(&root, &grant, &TreeScope::recursive()).unwrap(), 0);

        let photo = ops.acl_entries(&root.join("2024/photo.jpg"), AclKind::Access).unwrap();
        assert!(photo.iter().any(|e| e.is_user(&owner) && e.bits == 0o6));
        let raw = exacl::getfacl(&root, AclOption::empty()).unwrap();
        let mask = raw.iter().find(|e| e.kind == AclEntryKind::Mask && !is_default(e)).unwrap();
        assert!(mask.perms.contains(Perm::READ | Perm::WRITE | Perm::EXECUTE));
    }

    #[test]
    fn default_acl_lands_only_on_directories() {
        let (_temp, root) = acl_tree();
        let ops = SystemOps::new();
        let (owner, _) = current_names(&ops);
        let grant = AclGrant::new(owner.as_str(), AclPerms::READ_WRITE_TRAVERSE);

        assert_eq!(ops.set_default_acl(&root, &grant, &TreeScope::recursive()).unwrap(), 2);

        let dir = ops.acl_entries(&root.join("2024"), AclKind::Default).unwrap();
        assert!(dir.iter().any(|e| e.is_user(&owner) && e.bits == 0o7));
        let file = ops.acl_entries(&root.join("2024/photo.jpg"), AclKind::Default).unwrap();
        assert!(file.is_empty());
    }

    #[test]
    fn probe_leaves_tree_unchanged() {
        let (_temp, root) = acl_tree();
        let ops = SystemOps::new();
        let (owner, _) = current_names(&ops);
        let before = crate::state_digest(&ops, &[root.as_path()]).unwrap();

        ops.acl_supported(&root).unwrap();
        ops.probe_acl(&root, &owner).unwrap();

        assert_eq!(crate::state_digest(&ops, &[root.as_path()]).unwrap(), before);
        let raw = exacl::getfacl(&root, AclOption::empty()).unwrap();
        assert!(!raw.iter().any(|e| e.kind == AclEntryKind::Mask));
    }

    #[test]
    fn removing_last_named_default_entry_drops_default_acl() {
        let (_temp, root) = acl_tree();
        let ops = SystemOps::new();
        let (owner, _) = current_names(&ops);
        let grant = AclGrant::new(owner.as_str(), AclPerms::READ_WRITE_TRAVERSE);
        ops.set_acl(&root, &grant, &TreeScope::single()).unwrap();
        ops.set_default_acl(&root, &grant, &TreeScope::single()).unwrap();

        assert_eq!(ops.remove_acl(&root, &owner, &TreeScope::single()).unwrap(), 1);

        assert!(ops.acl_entries(&root, AclKind::Access).unwrap().is_empty());
        let raw = exacl::getfacl(&root, AclOption::empty()).unwrap();
        assert!(!raw.iter().any(is_default), "{raw:?}");
        assert!(!raw.iter().any(|e| e.kind == AclEntryKind::Mask));
    }

    #[test]
    fn symlinked_root_is_listed_but_not_followed() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("nfs_uploads");
        fs::create_dir_all(target.join("2024")).unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o700)).unwrap();
        let link = temp.path().join("uploads");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let ops = SystemOps::new();
        assert_eq!(ops.walk(&link, &TreeScope::recursive()).unwrap(), vec![link.clone()]);
        assert_eq!(
            ops.chmod_recursive(&link, &crate::ModeRule::uniform(0o2775), &TreeScope::recursive())
                .unwrap(),
            0
        );
        assert_eq!(ops.stat(&target).unwrap().unwrap().mode, Mode::new(0o700));
    }

    #[test]
    fn mask_is_union_of_group_class() {
        let mut entries = vec![
            exacl::AclEntry::allow_user("", Perm::READ | Perm::WRITE | Perm::EXECUTE, Flag::empty()),
            exacl::AclEntry::allow_group("", Perm::READ, Flag::empty()),
            exacl::AclEntry::allow_other(Perm::READ, Flag::empty()),
        ];
        assert!(apply_edit(
            &mut entries,
            &AclEdit::Grant {
                user: "web".to_string(),
                bits: 0o7,
            },
            Flag::empty()
        ));
        recompute_mask(&mut entries, Flag::empty());

        let mask = entries.iter().find(|e| e.kind == AclEntryKind::Mask).unwrap();
        assert_eq!(mask.perms, Perm::READ | Perm::WRITE | Perm::EXECUTE);

        assert!(apply_edit(
            &mut entries,
            &AclEdit::Revoke {
                user: "web".to_string()
            },
            Flag::empty()
        ));
        recompute_mask(&mut entries, Flag::empty());
        assert!(!entries.iter().any(|e| e.kind == AclEntryKind::Mask));
    }
}
