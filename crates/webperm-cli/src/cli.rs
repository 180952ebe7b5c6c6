//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// webperm - Reconcile ownership, modes and ACLs of a web document root
#[derive(Parser, Debug)]
#[command(name = "webperm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (.toml or .json); flags override its values
    #[arg(short, long, global = true, env = "WEBPERM_CONFIG")]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Which site to act on. Required unless a settings file provides it.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteArgs {
    /// Document root to reconcile
    #[arg(short, long)]
    pub document_root: Option<PathBuf>,

    /// Account the application runs as
    #[arg(short, long)]
    pub user: Option<String>,

    /// Account that owns the code (default: <user>-code)
    #[arg(long)]
    pub code_owner: Option<String>,

    /// Group shared by both accounts (default: <user>)
    #[arg(short, long)]
    pub group: Option<String>,

    /// Login shell for the code owner
    #[arg(long)]
    pub shell: Option<PathBuf>,

    /// Writable path relative to the document root (repeatable)
    #[arg(short, long = "writable")]
    pub writable: Vec<String>,

    /// Domain used to name the repair artifact
    #[arg(long)]
    pub domain: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Reconcile the site and write its repair artifact
    ///
    /// Examples:
    ///   webperm apply -d /home/shop/public_html -u shop
    ///   webperm apply -d /home/shop/public_html -u shop --dry-run
    ///   webperm --config /etc/webperm/shop.toml apply
    Apply {
        #[command(flatten)]
        site: SiteArgs,

        /// Report actions without executing them
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Check the site for drift without changing anything
    Check {
        #[command(flatten)]
        site: SiteArgs,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Print the repair artifact that apply would write
    Plan {
        #[command(flatten)]
        site: SiteArgs,
    },

    /// Re-run a repair artifact (its shebang target)
    Replay {
        /// Path to the artifact
        artifact: PathBuf,

        /// Report actions without executing them
        #[arg(long)]
        dry_run: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn apply_collects_repeated_writable_flags() {
        let cli = Cli::parse_from([
            "webperm",
            "apply",
            "-d",
            "/srv/www",
            "-u",
            "shop",
            "-w",
            "uploads",
            "--writable",
            "cache",
            "--dry-run",
        ]);

        let Commands::Apply { site, dry_run, json } = cli.command else {
            panic!("expected apply");
        };
        assert!(dry_run);
        assert!(!json);
        assert_eq!(site.writable, vec!["uploads".to_string(), "cache".to_string()]);
        assert_eq!(site.document_root, Some(PathBuf::from("/srv/www")));
    }

    #[test]
    fn replay_takes_artifact_path() {
        let cli = Cli::parse_from(["webperm", "replay", "/home/shop/scripts/fix_permissions_shop"]);
        assert_eq!(
            cli.command,
            Commands::Replay {
                artifact: PathBuf::from("/home/shop/scripts/fix_permissions_shop"),
                dry_run: false,
                json: false,
            }
        );
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::parse_from(["webperm", "check", "--verbose", "--config", "site.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("site.toml")));
    }
}
