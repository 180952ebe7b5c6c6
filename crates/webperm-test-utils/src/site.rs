//! [`TestSite`] builder for reconciliation scenarios.

use std::path::{Path, PathBuf};

use webperm_fs::{AclKind, MemoryOps, PermissionOps, state_digest};

pub const RUNTIME_USER: &str = "shop";
pub const CODE_OWNER: &str = "shop-code";
pub const HOME: &str = "/home/shop";
pub const DOCUMENT_ROOT: &str = "/home/shop/public_html";
/// Third account used to simulate an external ownership reset
pub const INTRUDER: &str = "panel";

/// An in-memory host with one hosted site, as a control panel leaves it:
/// everything owned by the runtime user and far too permissive.
///
/// # Example
///
/// ```rust,no_run
/// use webperm_test_utils::TestSite;
///
/// let site = TestSite::wordpress();
/// site.file("wp-config.php", "<?php // config");
/// assert!(site.ops.contents(site.path("wp-config.php")).is_some());
/// ```
pub struct TestSite {
    pub ops: MemoryOps,
}

impl Default for TestSite {
    fn default() -> Self {
        Self::wordpress()
    }
}

impl TestSite {
    /// Runtime user with its group and home, an intruder account, and a
    /// document root with a few WordPress files and an existing uploads dir.
    pub fn wordpress() -> Self {
        let ops = MemoryOps::new();
        ops.add_group(RUNTIME_USER, &[])
            .add_group(INTRUDER, &[])
            .add_user(RUNTIME_USER, HOME, "/usr/sbin/nologin", RUNTIME_USER)
            .add_user(INTRUDER, "/var/panel", "/usr/sbin/nologin", INTRUDER)
            .add_dir(HOME, RUNTIME_USER, RUNTIME_USER, 0o750)
            .add_dir(DOCUMENT_ROOT, RUNTIME_USER, RUNTIME_USER, 0o777);
        let site = Self { ops };
        site.dir("wp-admin")
            .dir("wp-includes/js")
            .dir("wp-content/themes/twentyone")
            .dir("wp-content/uploads/2024")
            .file("index.php", "<?php require 'wp-blog-header.php';")
            .file("wp-includes/js/app.js", "console.log('hi')")
            .file("wp-content/themes/twentyone/style.css", "body {}")
            .file("wp-content/uploads/2024/photo.jpg", "JPEG");
        site
    }

    /// Absolute path of `relative` under the document root.
    pub fn path(&self, relative: &str) -> PathBuf {
        Path::new(DOCUMENT_ROOT).join(relative)
    }

    /// Add a `0777` directory (and ancestors) owned by the runtime user.
    pub fn dir(&self, relative: &str) -> &Self {
        self.ops.add_dir(self.path(relative), RUNTIME_USER, RUNTIME_USER, 0o777);
        self
    }

    /// Add a `0666` file owned by the runtime user. The parent must exist.
    pub fn file(&self, relative: &str, contents: &str) -> &Self {
        self.ops
            .add_file(self.path(relative), RUNTIME_USER, RUNTIME_USER, 0o666, contents);
        self
    }

    /// Add a file anywhere, e.g. in the shared home.
    pub fn home_file(&self, name: &str, contents: &str) -> &Self {
        self.ops.add_file(
            Path::new(HOME).join(name),
            RUNTIME_USER,
            RUNTIME_USER,
            0o600,
            contents,
        );
        self
    }

    /// Give the runtime user a named ACL entry on `relative`.
    pub fn runtime_acl(&self, relative: &str, bits: u8) -> &Self {
        self.ops
            .seed_acl(self.path(relative), AclKind::Access, RUNTIME_USER, bits);
        self
    }

    /// Simulate a "repair" tool handing the document root to a third account.
    pub fn reset_to_intruder(&self) -> &Self {
        self.ops.reset_ownership(DOCUMENT_ROOT, INTRUDER, INTRUDER);
        self
    }

    /// Digest of the shared home and everything below it.
    ///
    /// # Panics
    /// Panics if the in-memory tree cannot be read.
    pub fn digest(&self) -> String {
        state_digest(&self.ops, &[Path::new(HOME)]).expect("TestSite::digest: walk failed")
    }

    /// Entries under the document root the runtime user can write to
    /// outside `writable`, judged by mode bits and named ACL entries.
    ///
    /// # Panics
    /// Panics if the in-memory tree cannot be read.
    pub fn runtime_writable_outside(&self, writable: &[&str]) -> Vec<PathBuf> {
        let excluded: Vec<PathBuf> = writable.iter().map(|w| self.path(w)).collect();
        let scope = webperm_fs::TreeScope::recursive().excluding(excluded);
        let runtime = self
            .ops
            .lookup_identity(RUNTIME_USER)
            .expect("lookup")
            .expect("runtime user");
        let mut offenders = Vec::new();
        for path in self.ops.walk(Path::new(DOCUMENT_ROOT), &scope).expect("walk") {
            let meta = self.ops.stat(&path).expect("stat").expect("entry");
            if meta.kind == webperm_fs::EntryKind::Symlink {
                continue;
            }
            let bits = meta.mode.bits();
            let by_owner = meta.owner == RUNTIME_USER && bits & 0o200 != 0;
            let by_group = meta.group == runtime.primary_group && bits & 0o020 != 0;
            let by_other = bits & 0o002 != 0;
            let by_acl = self
                .ops
                .acl_entries(&path, AclKind::Access)
                .expect("acl")
                .iter()
                .any(|e| e.is_user(RUNTIME_USER) && e.grants_write());
            if by_owner || by_group || by_other || by_acl {
                offenders.push(path);
            }
        }
        offenders
    }
}
