//! Merging a settings file with command-line overrides

use std::path::Path;

use webperm_core::Settings;

use crate::cli::SiteArgs;
use crate::error::{CliError, Result};

impl SiteArgs {
    /// Load `config` if given, then apply every flag that was passed.
    ///
    /// Without a settings file, `--document-root` and `--user` are required.
    pub fn into_settings(self, config: Option<&Path>) -> Result<Settings> {
        let mut settings = match config {
            Some(path) => Settings::load(path)?,
            None => {
                let (Some(root), Some(user)) = (&self.document_root, &self.user) else {
                    return Err(CliError::user(
                        "--document-root and --user are required without --config",
                    ));
                };
                Settings::new(root.clone(), user.clone())
            }
        };

        if let Some(root) = self.document_root {
            settings.document_root = root;
        }
        if let Some(user) = self.user {
            settings.runtime_user = user;
        }
        if self.code_owner.is_some() {
            settings.code_owner = self.code_owner;
        }
        if self.group.is_some() {
            settings.shared_group = self.group;
        }
        if let Some(shell) = self.shell {
            settings.shell = shell;
        }
        if !self.writable.is_empty() {
            settings.writable = self.writable;
        }
        if self.domain.is_some() {
            settings.domain = self.domain;
        }

        // Symlinked document roots are reconciled at their real location
        if let Ok(real) = dunce::canonicalize(&settings.document_root) {
            settings.document_root = real;
        }
        Ok(settings)
    }
}
