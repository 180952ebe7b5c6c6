//! In-memory [`PermissionOps`] for previews and tests.
//!
//! Models a tree of directories, files and symlinks with owner, group,
//! mode, access ACL and default ACL per entry, plus a small account
//! database. A fresh instance contains only `/`. Failures can be injected
//! per subtree to simulate filesystems that refuse ACLs or ownership.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::ops::{GroupInfo, Identity, IdentitySpec, PathMeta, PermissionOps};
use crate::perms::{AclEdit, AclEntry, AclKind, EntryKind, Mode, Qualifier, TreeScope};
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct Node {
    kind: EntryKind,
    owner: String,
    group: String,
    mode: Mode,
    contents: Vec<u8>,
    access: BTreeMap<Qualifier, u8>,
    default: BTreeMap<Qualifier, u8>,
}

impl Node {
    fn new(kind: EntryKind, owner: &str, group: &str, mode: Mode) -> Self {
        Self {
            kind,
            owner: owner.to_string(),
            group: group.to_string(),
            mode,
            contents: Vec::new(),
            access: BTreeMap::new(),
            default: BTreeMap::new(),
        }
    }

    fn meta(&self) -> PathMeta {
        PathMeta {
            kind: self.kind,
            owner: self.owner.clone(),
            group: self.group.clone(),
            mode: self.mode,
        }
    }

    fn acl_mut(&mut self, kind: AclKind) -> &mut BTreeMap<Qualifier, u8> {
        match kind {
            AclKind::Access => &mut self.access,
            AclKind::Default => &mut self.default,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<PathBuf, Node>,
    users: BTreeMap<String, Identity>,
    groups: BTreeMap<String, GroupInfo>,
    next_id: u32,
    acl_denied: Vec<PathBuf>,
    chown_denied: Vec<PathBuf>,
    acl_unsupported: bool,
}

impl State {
    fn node(&self, path: &Path) -> Result<&Node> {
        self.nodes.get(path).ok_or_else(|| not_found(path))
    }

    fn node_mut(&mut self, path: &Path) -> Result<&mut Node> {
        self.nodes.get_mut(path).ok_or_else(|| not_found(path))
    }

    fn check_parent(&self, path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) if self.nodes.get(parent).is_some_and(|n| n.kind == EntryKind::Dir) => {
                Ok(())
            }
            _ => Err(not_found(path)),
        }
    }

    fn check_acl(&self, path: &Path) -> Result<()> {
        if self.acl_unsupported {
            return Err(Error::acl(path, io::Error::from(io::ErrorKind::Unsupported)));
        }
        if self.acl_denied.iter().any(|p| path.starts_with(p)) {
            return Err(Error::acl(path, io::Error::from(io::ErrorKind::PermissionDenied)));
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        1000 + self.next_id
    }
}

fn not_found(path: &Path) -> Error {
    Error::io(path, io::Error::from(io::ErrorKind::NotFound))
}

/// An in-memory filesystem and account database.
#[derive(Debug)]
pub struct MemoryOps {
    state: Mutex<State>,
}

impl Default for MemoryOps {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOps {
    /// A tree containing only `/`, owned by `root:root`, and the `root` account.
    pub fn new() -> Self {
        let mut state = State::default();
        state.nodes.insert(
            PathBuf::from("/"),
            Node::new(EntryKind::Dir, "root", "root", Mode::new(0o755)),
        );
        state.groups.insert(
            "root".to_string(),
            GroupInfo {
                name: "root".to_string(),
                gid: 0,
                members: Vec::new(),
            },
        );
        state.users.insert(
            "root".to_string(),
            Identity {
                name: "root".to_string(),
                uid: 0,
                gid: 0,
                primary_group: "root".to_string(),
                home: PathBuf::from("/root"),
                shell: PathBuf::from("/bin/bash"),
            },
        );
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a group with supplementary members.
    pub fn add_group(&self, name: &str, members: &[&str]) -> &Self {
        let mut state = self.lock();
        let gid = state.allocate_id();
        state.groups.insert(
            name.to_string(),
            GroupInfo {
                name: name.to_string(),
                gid,
                members: members.iter().map(|m| m.to_string()).collect(),
            },
        );
        self
    }

    /// Register an account. The primary group must already exist.
    pub fn add_user(&self, name: &str, home: impl AsRef<Path>, shell: &str, group: &str) -> &Self {
        let mut state = self.lock();
        let uid = state.allocate_id();
        let gid = state.groups.get(group).map(|g| g.gid).unwrap_or(uid);
        state.users.insert(
            name.to_string(),
            Identity {
                name: name.to_string(),
                uid,
                gid,
                primary_group: group.to_string(),
                home: home.as_ref().to_path_buf(),
                shell: PathBuf::from(shell),
            },
        );
        self
    }

    /// Insert a directory and any missing ancestors with the same metadata.
    pub fn add_dir(&self, path: impl AsRef<Path>, owner: &str, group: &str, mode: u32) -> &Self {
        let mut state = self.lock();
        let path = path.as_ref();
        for ancestor in path.ancestors().collect::<Vec<_>>().into_iter().rev() {
            state
                .nodes
                .entry(ancestor.to_path_buf())
                .or_insert_with(|| Node::new(EntryKind::Dir, owner, group, Mode::new(mode)));
        }
        if let Some(node) = state.nodes.get_mut(path) {
            node.owner = owner.to_string();
            node.group = group.to_string();
            node.mode = Mode::new(mode);
        }
        self
    }

    /// Insert a regular file with content. The parent must exist.
    pub fn add_file(
        &self,
        path: impl AsRef<Path>,
        owner: &str,
        group: &str,
        mode: u32,
        contents: &str,
    ) -> &Self {
        let mut state = self.lock();
        let mut node = Node::new(EntryKind::File, owner, group, Mode::new(mode));
        node.contents = contents.as_bytes().to_vec();
        state.nodes.insert(path.as_ref().to_path_buf(), node);
        self
    }

    /// Insert a symlink entry (targets are never followed).
    pub fn add_symlink(&self, path: impl AsRef<Path>, owner: &str, group: &str) -> &Self {
        let mut state = self.lock();
        state.nodes.insert(
            path.as_ref().to_path_buf(),
            Node::new(EntryKind::Symlink, owner, group, Mode::new(0o777)),
        );
        self
    }

    /// Seed a named-user ACL entry directly, bypassing mask rules.
    pub fn seed_acl(&self, path: impl AsRef<Path>, kind: AclKind, user: &str, bits: u8) -> &Self {
        let mut state = self.lock();
        if let Some(node) = state.nodes.get_mut(path.as_ref()) {
            node.acl_mut(kind).insert(Qualifier::User(user.to_string()), bits);
        }
        self
    }

    /// Make every ACL write under `prefix` fail with permission denied.
    pub fn deny_acl_under(&self, prefix: impl AsRef<Path>) -> &Self {
        self.lock().acl_denied.push(prefix.as_ref().to_path_buf());
        self
    }

    /// Make every chown under `prefix` fail with permission denied.
    pub fn deny_chown_under(&self, prefix: impl AsRef<Path>) -> &Self {
        self.lock().chown_denied.push(prefix.as_ref().to_path_buf());
        self
    }

    /// Make every ACL read and write fail as unsupported.
    pub fn set_acl_unsupported(&self, unsupported: bool) -> &Self {
        self.lock().acl_unsupported = unsupported;
        self
    }

    /// Reset owner and group of every entry under `root`, as an external
    /// "repair" tool would.
    pub fn reset_ownership(&self, root: impl AsRef<Path>, owner: &str, group: &str) -> &Self {
        let mut state = self.lock();
        let root = root.as_ref();
        for (path, node) in state.nodes.iter_mut() {
            if path.starts_with(root) {
                node.owner = owner.to_string();
                node.group = group.to_string();
            }
        }
        self
    }

    /// Contents of a file, if it exists.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        self.lock()
            .nodes
            .get(path.as_ref())
            .map(|n| String::from_utf8_lossy(&n.contents).into_owned())
    }

    /// Paths of all entries, in order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().nodes.keys().cloned().collect()
    }
}

impl PermissionOps for MemoryOps {
    fn lookup_identity(&self, name: &str) -> Result<Option<Identity>> {
        Ok(self.lock().users.get(name).cloned())
    }

    fn lookup_group(&self, name: &str) -> Result<Option<GroupInfo>> {
        Ok(self.lock().groups.get(name).cloned())
    }

    fn ensure_identity(&self, spec: &IdentitySpec) -> Result<bool> {
        let mut state = self.lock();
        let gid = state
            .groups
            .get(&spec.group)
            .map(|g| g.gid)
            .ok_or_else(|| Error::UnknownGroup {
                name: spec.group.clone(),
            })?;
        if let Some(existing) = state.users.get_mut(&spec.name) {
            if spec.is_satisfied_by(existing) {
                return Ok(false);
            }
            existing.home = spec.home.clone();
            existing.shell = spec.shell.clone();
            existing.primary_group = spec.group.clone();
            existing.gid = gid;
            return Ok(true);
        }
        let uid = state.allocate_id();
        state.users.insert(
            spec.name.clone(),
            Identity {
                name: spec.name.clone(),
                uid,
                gid,
                primary_group: spec.group.clone(),
                home: spec.home.clone(),
                shell: spec.shell.clone(),
            },
        );
        Ok(true)
    }

    fn stat(&self, path: &Path) -> Result<Option<PathMeta>> {
        Ok(self.lock().nodes.get(path).map(Node::meta))
    }

    fn walk(&self, root: &Path, scope: &TreeScope) -> Result<Vec<PathBuf>> {
        let state = self.lock();
        let Some(node) = state.nodes.get(root) else {
            return Ok(Vec::new());
        };
        if scope.excludes(root) {
            return Ok(Vec::new());
        }
        if !scope.recursive || node.kind != EntryKind::Dir {
            return Ok(vec![root.to_path_buf()]);
        }
        Ok(state
            .nodes
            .keys()
            .filter(|p| p.starts_with(root) && !scope.excludes(p))
            .cloned()
            .collect())
    }

    fn create_dir(&self, path: &Path, owner: &str, group: &str, mode: Mode) -> Result<bool> {
        let mut state = self.lock();
        if state.nodes.contains_key(path) {
            return Ok(false);
        }
        state.check_parent(path)?;
        state
            .nodes
            .insert(path.to_path_buf(), Node::new(EntryKind::Dir, owner, group, mode));
        Ok(true)
    }

    fn create_file(&self, path: &Path, owner: &str, group: &str, mode: Mode) -> Result<bool> {
        let mut state = self.lock();
        if state.nodes.contains_key(path) {
            return Ok(false);
        }
        state.check_parent(path)?;
        state
            .nodes
            .insert(path.to_path_buf(), Node::new(EntryKind::File, owner, group, mode));
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
        let mut state = self.lock();
        let unchanged = state.nodes.get(path).is_some_and(|node| {
            node.kind == EntryKind::File
                && node.contents == contents
                && node.owner == owner
                && node.group == group
                && node.mode == mode
        });
        if unchanged {
            return Ok(false);
        }
        state.check_parent(path)?;
        let mut node = Node::new(EntryKind::File, owner, group, mode);
        node.contents = contents.to_vec();
        state.nodes.insert(path.to_path_buf(), node);
        Ok(true)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.lock();
        let node = state.node(path)?;
        if node.kind != EntryKind::File {
            return Err(Error::io(path, io::Error::from(io::ErrorKind::InvalidInput)));
        }
        Ok(node.contents.clone())
    }

    fn set_owner(&self, path: &Path, owner: &str, group: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.users.contains_key(owner) {
            return Err(Error::UnknownIdentity {
                name: owner.to_string(),
            });
        }
        if !state.groups.contains_key(group) {
            return Err(Error::UnknownGroup {
                name: group.to_string(),
            });
        }
        if state.chown_denied.iter().any(|p| path.starts_with(p)) {
            return Err(Error::io(path, io::Error::from(io::ErrorKind::PermissionDenied)));
        }
        let node = state.node_mut(path)?;
        node.owner = owner.to_string();
        node.group = group.to_string();
        Ok(())
    }

    fn set_mode(&self, path: &Path, mode: Mode) -> Result<()> {
        self.lock().node_mut(path)?.mode = mode;
        Ok(())
    }

    fn acl_entries(&self, path: &Path, kind: AclKind) -> Result<Vec<AclEntry>> {
        let state = self.lock();
        if state.acl_unsupported {
            return Ok(Vec::new());
        }
        let node = state.node(path)?;
        let acl = match kind {
            AclKind::Access => &node.access,
            AclKind::Default => &node.default,
        };
        Ok(acl
            .iter()
            .map(|(qualifier, bits)| AclEntry {
                qualifier: qualifier.clone(),
                bits: *bits,
            })
            .collect())
    }

    fn acl_supported(&self, path: &Path) -> Result<()> {
        let state = self.lock();
        state.node(path)?;
        if state.acl_unsupported {
            return Err(Error::acl(path, io::Error::from(io::ErrorKind::Unsupported)));
        }
        Ok(())
    }

    fn update_acl(&self, path: &Path, kind: AclKind, edit: &AclEdit) -> Result<bool> {
        let mut state = self.lock();
        state.check_acl(path)?;
        let node = state.node_mut(path)?;
        if kind == AclKind::Default && node.kind != EntryKind::Dir {
            return Err(Error::acl(path, io::Error::from(io::ErrorKind::InvalidInput)));
        }
        let acl = node.acl_mut(kind);
        Ok(match edit {
            AclEdit::Grant { user, bits } => {
                acl.insert(Qualifier::User(user.clone()), *bits) != Some(*bits)
            }
            AclEdit::Revoke { user } => acl.remove(&Qualifier::User(user.clone())).is_some(),
        })
    }
}
