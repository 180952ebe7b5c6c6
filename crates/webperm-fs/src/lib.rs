//! Filesystem and identity operations for webperm
//!
//! Provides the [`PermissionOps`] capability interface with a host backend
//! ([`SystemOps`]) and an in-memory backend ([`MemoryOps`]), plus the
//! permission value types they exchange.

pub mod checksum;
pub mod config;
pub mod error;
pub mod io;
pub mod memory;
pub mod ops;
pub mod perms;
#[cfg(target_os = "linux")]
pub mod system;

pub use checksum::{compute_content_checksum, state_digest};
pub use config::ConfigStore;
pub use error::{Error, Result};
pub use memory::MemoryOps;
pub use ops::{GroupInfo, Identity, IdentitySpec, PathMeta, PermissionOps};
pub use perms::{
    AclEdit, AclEntry, AclGrant, AclKind, AclPerms, EntryKind, ExecBit, Mode, ModeRule,
    Qualifier, TreeScope, format_bits,
};
#[cfg(target_os = "linux")]
pub use system::SystemOps;
