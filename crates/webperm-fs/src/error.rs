//! Error types for webperm-fs

use std::path::PathBuf;

use nix::errno::Errno;

/// Result type for webperm-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in webperm-fs operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ACL operation failed at {path}: {source}")]
    Acl {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown identity: {name}")]
    UnknownIdentity { name: String },

    #[error("Unknown group: {name}")]
    UnknownGroup { name: String },

    #[error("Account operation failed for {name}: {message}")]
    Account { name: String, message: String },

    #[error("Invalid ACL permissions '{value}': expected three characters like \"rwX\"")]
    InvalidPerms { value: String },

    #[error("Invalid mode '{value}': expected an octal value like \"0755\"")]
    InvalidMode { value: String },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn acl(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Acl {
            path: path.into(),
            source,
        }
    }

    /// Whether this is an ACL call the filesystem refused outright.
    ///
    /// Network mounts that do not honour POSIX ACLs report one of
    /// `EACCES`, `EPERM` or `EOPNOTSUPP`.
    pub fn is_acl_denied(&self) -> bool {
        let Self::Acl { source, .. } = self else {
            return false;
        };
        if let Some(code) = source.raw_os_error() {
            return [Errno::EACCES, Errno::EPERM, Errno::EOPNOTSUPP]
                .iter()
                .any(|errno| *errno as i32 == code);
        }
        matches!(
            source.kind(),
            std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::Unsupported
        )
    }
}
