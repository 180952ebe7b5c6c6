//! Error types for webperm-core

use std::path::PathBuf;

use crate::model::PathClassKind;

/// Result type for webperm-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in webperm-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Runtime identity has no account record
    #[error("Identity not found: {name}")]
    IdentityMissing { name: String },

    /// Shared group does not exist
    #[error("Group not found: {name}")]
    GroupMissing { name: String },

    /// ACL capability probe failed on the shared home
    #[error("ACLs are not usable at {path}: {reason}")]
    AclUnsupported { path: PathBuf, reason: String },

    /// A required path is absent or has the wrong type
    #[error("Path not found or not a directory: {path}")]
    PathNotFound { path: PathBuf },

    /// A mutation failed while processing a path class
    #[error("Failed to apply {action} while processing {class}: {source}")]
    ApplyFailed {
        class: PathClassKind,
        action: String,
        #[source]
        source: webperm_fs::Error,
    },

    /// A writable path is not a plain relative path
    #[error("Invalid writable path '{path}': {reason}")]
    InvalidWritablePath { path: String, reason: String },

    /// A writable path or one of its ancestors under the document root is a symlink
    #[error("Refusing to manage {path}: it is a symlink, writable paths must be real directories")]
    SymlinkedPath { path: PathBuf },

    /// An ACL was refused and group bits cannot stand in for it
    #[error(
        "ACL refused on {path} and {user} is not a member of {group}; mode bits alone cannot grant it write access"
    )]
    GroupFallbackUnavailable {
        path: PathBuf,
        user: String,
        group: String,
    },

    /// Code owner and runtime identity must differ
    #[error("Code owner and runtime identity are both '{name}'")]
    IdentityConflict { name: String },

    /// Artifact text could not be understood
    #[error("Invalid repair artifact: {message}")]
    ArtifactFormat { message: String },

    /// Settings are incomplete or inconsistent
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from webperm-fs
    #[error(transparent)]
    Fs(#[from] webperm_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}
