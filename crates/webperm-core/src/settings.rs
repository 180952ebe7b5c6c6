//! Run settings and their resolution against live account state
//!
//! [`Settings`] is what a user writes (config file plus CLI overrides).
//! [`ResolvedParams`] is what the model is built from: every default filled
//! in and the shared home read from the runtime identity's account record.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use webperm_fs::{ConfigStore, PermissionOps};

use crate::{Error, Result};

/// Writable paths used when none are configured.
pub const DEFAULT_WRITABLE: &[&str] = &["wp-content/uploads", "wp-content/cache"];

/// File-name prefix of the generated repair artifact.
pub const DEFAULT_ARTIFACT_PREFIX: &str = "fix_permissions";

/// Name of the scripts directory under the shared home.
pub const SCRIPTS_DIR: &str = "scripts";

fn default_shell() -> PathBuf {
    PathBuf::from("/bin/bash")
}

fn default_writable() -> Vec<String> {
    DEFAULT_WRITABLE.iter().map(|p| p.to_string()).collect()
}

fn default_artifact_prefix() -> String {
    DEFAULT_ARTIFACT_PREFIX.to_string()
}

/// User-facing settings for one document root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub document_root: PathBuf,
    /// Account the application runs as
    pub runtime_user: String,
    /// Account that owns the code; defaults to `<runtime_user>-code`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_owner: Option<String>,
    /// Group shared by both accounts; defaults to the runtime user's name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_group: Option<String>,
    /// Login shell for the code owner
    #[serde(default = "default_shell")]
    pub shell: PathBuf,
    /// Paths relative to the document root the runtime user may write to
    #[serde(default = "default_writable")]
    pub writable: Vec<String>,
    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,
    /// Names the artifact instead of the document root's basename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Settings {
    /// Settings with every optional field at its default.
    pub fn new(document_root: impl Into<PathBuf>, runtime_user: impl Into<String>) -> Self {
        Self {
            document_root: document_root.into(),
            runtime_user: runtime_user.into(),
            code_owner: None,
            shared_group: None,
            shell: default_shell(),
            writable: default_writable(),
            artifact_prefix: default_artifact_prefix(),
            domain: None,
        }
    }

    /// Load settings from a `.toml` or `.json` file.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(ConfigStore::new().load(path)?)
    }

    pub fn code_owner(&self) -> String {
        self.code_owner
            .clone()
            .unwrap_or_else(|| format!("{}-code", self.runtime_user))
    }

    pub fn shared_group(&self) -> String {
        self.shared_group
            .clone()
            .unwrap_or_else(|| self.runtime_user.clone())
    }

    /// Fill defaults and read the shared home from the runtime account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentityMissing`] if the runtime user has no account,
    /// and [`Error::Config`] if no artifact name can be derived.
    pub fn resolve<O: PermissionOps + ?Sized>(&self, ops: &O) -> Result<ResolvedParams> {
        if self.runtime_user.is_empty() {
            return Err(Error::Config {
                message: "runtime_user must not be empty".into(),
            });
        }
        let runtime = ops
            .lookup_identity(&self.runtime_user)?
            .ok_or_else(|| Error::IdentityMissing {
                name: self.runtime_user.clone(),
            })?;

        let shared_home = runtime.home;
        let artifact_path = shared_home
            .join(SCRIPTS_DIR)
            .join(format!("{}_{}", self.artifact_prefix, self.artifact_suffix()?));

        Ok(ResolvedParams {
            document_root: self.document_root.clone(),
            shared_home,
            runtime_user: self.runtime_user.clone(),
            code_owner: self.code_owner(),
            shared_group: self.shared_group(),
            shell: self.shell.clone(),
            writable: self.writable.clone(),
            artifact_path,
        })
    }

    fn artifact_suffix(&self) -> Result<String> {
        let suffix = match &self.domain {
            Some(domain) => domain.clone(),
            None => self
                .document_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        if suffix.is_empty() || suffix.contains('/') || suffix == "." || suffix == ".." {
            return Err(Error::Config {
                message: format!(
                    "cannot name the repair artifact from '{}'; set a domain",
                    suffix
                ),
            });
        }
        Ok(suffix)
    }
}

/// Fully resolved inputs of one run, passed by value into the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedParams {
    pub document_root: PathBuf,
    pub shared_home: PathBuf,
    pub runtime_user: String,
    pub code_owner: String,
    pub shared_group: String,
    pub shell: PathBuf,
    /// Raw writable paths, validated when the model is built
    pub writable: Vec<String>,
    pub artifact_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use webperm_fs::MemoryOps;

    fn ops() -> MemoryOps {
        let ops = MemoryOps::new();
        ops.add_group("shop", &[]).add_user("shop", "/home/shop", "/usr/sbin/nologin", "shop");
        ops
    }

    #[test]
    fn defaults_derive_from_runtime_user() {
        let params = Settings::new("/home/shop/public_html", "shop")
            .resolve(&ops())
            .unwrap();

        assert_eq!(params.code_owner, "shop-code");
        assert_eq!(params.shared_group, "shop");
        assert_eq!(params.shared_home, PathBuf::from("/home/shop"));
        assert_eq!(params.shell, PathBuf::from("/bin/bash"));
        assert_eq!(params.writable, default_writable());
        assert_eq!(
            params.artifact_path,
            PathBuf::from("/home/shop/scripts/fix_permissions_public_html")
        );
    }

    #[test]
    fn domain_names_the_artifact() {
        let mut settings = Settings::new("/home/shop/public_html", "shop");
        settings.domain = Some("shop.example.com".into());

        let params = settings.resolve(&ops()).unwrap();
        assert_eq!(
            params.artifact_path,
            PathBuf::from("/home/shop/scripts/fix_permissions_shop.example.com")
        );
    }

    #[test]
    fn missing_runtime_user_is_identity_missing() {
        let err = Settings::new("/srv/www", "ghost").resolve(&ops()).unwrap_err();
        assert!(matches!(err, Error::IdentityMissing { ref name } if name == "ghost"));
    }

    #[test]
    fn domain_with_slash_is_rejected() {
        let mut settings = Settings::new("/home/shop/public_html", "shop");
        settings.domain = Some("../etc".into());

        let err = settings.resolve(&ops()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn toml_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
document_root = "/home/shop/public_html"
runtime_user = "shop"
writable = ["wp-content/uploads"]
"#,
        )
        .unwrap();

        assert_eq!(settings.writable, vec!["wp-content/uploads".to_string()]);
        assert_eq!(settings.artifact_prefix, DEFAULT_ARTIFACT_PREFIX);
        assert_eq!(settings.code_owner(), "shop-code");
    }
}
