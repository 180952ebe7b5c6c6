//! The declarative state model
//!
//! A [`StateModel`] is recomputed on every run from [`ResolvedParams`]. It
//! lists each path class with its desired ownership, mode and ACL state, in
//! the order they must be applied: shared home, scripts directory, home
//! scaffold, code tree, then each writable directory. Writable directories
//! sit inside the code tree and end looser than it, so they come last.

use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use webperm_fs::{AclGrant, AclPerms, EntryKind, IdentitySpec, Mode, ModeRule};

use crate::settings::{ResolvedParams, SCRIPTS_DIR};
use crate::{Error, Result};

pub const CODE_DIR_MODE: Mode = Mode::new(0o755);
pub const CODE_FILE_MODE: Mode = Mode::new(0o644);
pub const WRITABLE_MODE: Mode = Mode::new(0o2775);
pub const SCRIPTS_MODE: Mode = Mode::new(0o755);
pub const ARTIFACT_MODE: Mode = Mode::new(0o750);

/// Home scaffold entries: name, kind, mode.
pub const DOT_RESOURCES: &[(&str, EntryKind, Mode)] = &[
    (".ssh", EntryKind::Dir, Mode::new(0o700)),
    (".wp-cli", EntryKind::Dir, Mode::new(0o700)),
    (".bash_profile", EntryKind::File, Mode::new(0o644)),
];

/// The classes of paths webperm manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathClassKind {
    SharedHomeRoot,
    ScriptsDir,
    DotResource,
    CodeTree,
    WritableDir,
}

impl fmt::Display for PathClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SharedHomeRoot => "SharedHomeRoot",
            Self::ScriptsDir => "ScriptsDir",
            Self::DotResource => "DotResource",
            Self::CodeTree => "CodeTree",
            Self::WritableDir => "WritableDir",
        };
        f.write_str(name)
    }
}

/// Owner and group of a managed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub owner: String,
    pub group: String,
}

/// Desired state of one path class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Desired {
    /// Code owner account plus a traversal grant on the shared home.
    /// Nothing else on the home is touched.
    SharedHomeRoot {
        code_owner: IdentitySpec,
        traverse: AclGrant,
    },
    ScriptsDir { ownership: Ownership, mode: Mode },
    /// Created only if absent.
    DotResource {
        kind: EntryKind,
        ownership: Ownership,
        mode: Mode,
    },
    CodeTree {
        ownership: Ownership,
        modes: ModeRule,
        /// User that must hold no named ACL entry in the tree
        runtime_user: String,
        /// Writable subtrees left to their own class
        exclude: Vec<PathBuf>,
    },
    WritableDir {
        ownership: Ownership,
        mode: Mode,
        grant: AclGrant,
        /// Mode for missing ancestors between the document root and this path
        parent_mode: Mode,
    },
}

/// One concrete path with its desired state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathClass {
    pub path: PathBuf,
    pub desired: Desired,
}

impl PathClass {
    pub fn kind(&self) -> PathClassKind {
        match self.desired {
            Desired::SharedHomeRoot { .. } => PathClassKind::SharedHomeRoot,
            Desired::ScriptsDir { .. } => PathClassKind::ScriptsDir,
            Desired::DotResource { .. } => PathClassKind::DotResource,
            Desired::CodeTree { .. } => PathClassKind::CodeTree,
            Desired::WritableDir { .. } => PathClassKind::WritableDir,
        }
    }
}

/// Ordered path classes for one document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateModel {
    pub params: ResolvedParams,
    pub classes: Vec<PathClass>,
}

impl StateModel {
    /// Build the model for `params`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdentityConflict`] if the code owner is the runtime
    /// user, and [`Error::InvalidWritablePath`] for a writable path that is
    /// absolute, empty, or escapes the document root.
    pub fn build(params: ResolvedParams) -> Result<Self> {
        if params.code_owner == params.runtime_user {
            return Err(Error::IdentityConflict {
                name: params.code_owner.clone(),
            });
        }

        let writable = writable_paths(&params.document_root, &params.writable)?;
        let ownership = Ownership {
            owner: params.code_owner.clone(),
            group: params.shared_group.clone(),
        };
        let home = &params.shared_home;

        let mut classes = vec![
            PathClass {
                path: home.clone(),
                desired: Desired::SharedHomeRoot {
                    code_owner: IdentitySpec {
                        name: params.code_owner.clone(),
                        home: home.clone(),
                        shell: params.shell.clone(),
                        group: params.shared_group.clone(),
                    },
                    traverse: AclGrant::new(params.code_owner.clone(), AclPerms::TRAVERSE),
                },
            },
            PathClass {
                path: home.join(SCRIPTS_DIR),
                desired: Desired::ScriptsDir {
                    ownership: ownership.clone(),
                    mode: SCRIPTS_MODE,
                },
            },
        ];

        classes.extend(DOT_RESOURCES.iter().map(|(name, kind, mode)| PathClass {
            path: home.join(name),
            desired: Desired::DotResource {
                kind: *kind,
                ownership: ownership.clone(),
                mode: *mode,
            },
        }));

        classes.push(PathClass {
            path: params.document_root.clone(),
            desired: Desired::CodeTree {
                ownership: ownership.clone(),
                modes: ModeRule {
                    dirs: Some(CODE_DIR_MODE),
                    files: Some(CODE_FILE_MODE),
                },
                runtime_user: params.runtime_user.clone(),
                exclude: writable.clone(),
            },
        });

        classes.extend(writable.into_iter().map(|path| PathClass {
            path,
            desired: Desired::WritableDir {
                ownership: ownership.clone(),
                mode: WRITABLE_MODE,
                grant: AclGrant::new(params.runtime_user.clone(), AclPerms::READ_WRITE_TRAVERSE),
                parent_mode: CODE_DIR_MODE,
            },
        }));

        Ok(Self { params, classes })
    }

    /// Absolute writable paths, in caller order.
    pub fn writable(&self) -> impl Iterator<Item = &Path> {
        self.classes
            .iter()
            .filter(|c| c.kind() == PathClassKind::WritableDir)
            .map(|c| c.path.as_path())
    }
}

/// Validate and absolutize writable paths, dropping later duplicates.
fn writable_paths(document_root: &Path, raw: &[String]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();
    for entry in raw {
        let relative = validate_writable(entry)?;
        if seen.insert(relative.clone()) {
            paths.push(document_root.join(relative));
        }
    }
    Ok(paths)
}

/// Normalize one writable path, rejecting anything but plain names.
pub fn validate_writable(raw: &str) -> Result<PathBuf> {
    let invalid = |reason: &str| Error::InvalidWritablePath {
        path: raw.to_string(),
        reason: reason.to_string(),
    };
    let mut normalized = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(name) => normalized.push(name),
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("must not contain '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("must be relative to the document root"));
            }
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(invalid("must name a directory below the document root"));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn params(writable: &[&str]) -> ResolvedParams {
        ResolvedParams {
            document_root: PathBuf::from("/home/shop/public_html"),
            shared_home: PathBuf::from("/home/shop"),
            runtime_user: "shop".into(),
            code_owner: "shop-code".into(),
            shared_group: "shop".into(),
            shell: PathBuf::from("/bin/bash"),
            writable: writable.iter().map(|w| w.to_string()).collect(),
            artifact_path: PathBuf::from("/home/shop/scripts/fix_permissions_public_html"),
        }
    }

    #[test]
    fn classes_follow_application_order() {
        let model = StateModel::build(params(&["wp-content/uploads", "wp-content/cache"])).unwrap();
        let kinds: Vec<_> = model.classes.iter().map(PathClass::kind).collect();

        assert_eq!(
            kinds,
            vec![
                PathClassKind::SharedHomeRoot,
                PathClassKind::ScriptsDir,
                PathClassKind::DotResource,
                PathClassKind::DotResource,
                PathClassKind::DotResource,
                PathClassKind::CodeTree,
                PathClassKind::WritableDir,
                PathClassKind::WritableDir,
            ]
        );
        let writable: Vec<_> = model.writable().collect();
        assert_eq!(
            writable,
            vec![
                Path::new("/home/shop/public_html/wp-content/uploads"),
                Path::new("/home/shop/public_html/wp-content/cache"),
            ]
        );
    }

    #[test]
    fn code_tree_excludes_writable_subtrees() {
        let model = StateModel::build(params(&["wp-content/uploads"])).unwrap();
        let code_tree = model
            .classes
            .iter()
            .find(|c| c.kind() == PathClassKind::CodeTree)
            .unwrap();

        let Desired::CodeTree { exclude, .. } = &code_tree.desired else {
            panic!("expected code tree");
        };
        assert_eq!(exclude, &vec![PathBuf::from("/home/shop/public_html/wp-content/uploads")]);
    }

    #[test]
    fn duplicate_writable_paths_collapse() {
        let model =
            StateModel::build(params(&["wp-content/uploads", "./wp-content/uploads/"])).unwrap();
        assert_eq!(model.writable().count(), 1);
    }

    #[test]
    fn code_owner_must_differ_from_runtime() {
        let mut p = params(&[]);
        p.code_owner = "shop".into();

        let err = StateModel::build(p).unwrap_err();
        assert!(matches!(err, Error::IdentityConflict { .. }));
    }

    #[rstest]
    #[case("/etc")]
    #[case("../other_site")]
    #[case("wp-content/../../x")]
    #[case("")]
    #[case(".")]
    fn rejects_invalid_writable_paths(#[case] raw: &str) {
        let err = StateModel::build(params(&[raw])).unwrap_err();
        assert!(matches!(err, Error::InvalidWritablePath { .. }));
    }

    #[test]
    fn shared_home_grants_traverse_to_code_owner() {
        let model = StateModel::build(params(&[])).unwrap();
        let Desired::SharedHomeRoot { code_owner, traverse } = &model.classes[0].desired else {
            panic!("expected shared home first");
        };
        assert_eq!(code_owner.home, PathBuf::from("/home/shop"));
        assert_eq!(code_owner.group, "shop");
        assert_eq!(traverse.to_string(), "u:shop-code:r-x");
    }
}
