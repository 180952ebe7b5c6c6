//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used for
//! artifact fingerprints and for digests of a tree's metadata state.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::perms::{AclKind, EntryKind, TreeScope, format_bits};
use crate::{PermissionOps, Result};

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of string content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_content_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Digest of ownership, mode, ACLs and file contents under `roots`.
///
/// Two digests are equal exactly when nothing observable changed, which is
/// how dry runs are shown to leave a tree alone.
pub fn state_digest<O: PermissionOps + ?Sized>(ops: &O, roots: &[&Path]) -> Result<String> {
    let mut hasher = Sha256::new();
    for root in roots {
        for path in ops.walk(root, &TreeScope::recursive())? {
            let Some(meta) = ops.stat(&path)? else {
                continue;
            };
            hasher.update(
                format!(
                    "{}|{:?}|{}:{}|{}\n",
                    path.display(),
                    meta.kind,
                    meta.owner,
                    meta.group,
                    meta.mode
                )
                .as_bytes(),
            );
            let kinds: &[AclKind] = match meta.kind {
                EntryKind::Dir => &[AclKind::Access, AclKind::Default],
                EntryKind::File => &[AclKind::Access],
                EntryKind::Symlink | EntryKind::Other => &[],
            };
            for kind in kinds {
                for entry in ops.acl_entries(&path, *kind)? {
                    hasher.update(
                        format!("  {:?} {:?} {}\n", kind, entry.qualifier, format_bits(entry.bits))
                            .as_bytes(),
                    );
                }
            }
            if meta.kind == EntryKind::File {
                hasher.update(ops.read_file(&path)?);
            }
        }
    }
    Ok(format!("{}{:x}", PREFIX, hasher.finalize()))
}
