//! The ordered action list shared by the reconciler and repair artifacts
//!
//! A [`Plan`] is pure data: every identity and path is a literal. The
//! reconciler executes it, the artifact generator serializes it, and a
//! replayed artifact deserializes it back into the same value.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use webperm_fs::{AclGrant, EntryKind, IdentitySpec, Mode, ModeRule, TreeScope};

use crate::model::{Desired, PathClass, PathClassKind, StateModel};

/// One primitive mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// Create the account or correct its home, shell and primary group
    EnsureIdentity { identity: IdentitySpec },
    /// Create a directory if absent; `parents` is the mode for missing ancestors
    CreateDir {
        path: PathBuf,
        owner: String,
        group: String,
        mode: Mode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parents: Option<Mode>,
    },
    /// Create an empty file if absent
    CreateFile {
        path: PathBuf,
        owner: String,
        group: String,
        mode: Mode,
    },
    Chown {
        path: PathBuf,
        owner: String,
        group: String,
        scope: TreeScope,
    },
    Chmod {
        path: PathBuf,
        rule: ModeRule,
        scope: TreeScope,
    },
    SetAcl {
        path: PathBuf,
        grant: AclGrant,
        scope: TreeScope,
    },
    SetDefaultAcl {
        path: PathBuf,
        grant: AclGrant,
        scope: TreeScope,
    },
    /// Drop a user's access and default ACL entries
    RemoveAcl {
        path: PathBuf,
        user: String,
        scope: TreeScope,
    },
}

impl Action {
    pub fn is_acl(&self) -> bool {
        matches!(
            self,
            Self::SetAcl { .. } | Self::SetDefaultAcl { .. } | Self::RemoveAcl { .. }
        )
    }
}

fn recursive_flag(scope: &TreeScope) -> &'static str {
    if scope.recursive { "-R " } else { "" }
}

fn excluded_suffix(scope: &TreeScope) -> String {
    match scope.exclude.len() {
        0 => String::new(),
        n => format!(" (excluding {n} writable)"),
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnsureIdentity { identity } => write!(
                f,
                "ensure user {} (home {}, shell {}, group {})",
                identity.name,
                identity.home.display(),
                identity.shell.display(),
                identity.group
            ),
            Self::CreateDir {
                path,
                owner,
                group,
                mode,
                parents,
            } => {
                let p = if parents.is_some() { "-p " } else { "" };
                write!(f, "mkdir {p}-m {mode} {} ({owner}:{group})", path.display())
            }
            Self::CreateFile {
                path,
                owner,
                group,
                mode,
            } => write!(f, "touch {} ({mode} {owner}:{group})", path.display()),
            Self::Chown {
                path,
                owner,
                group,
                scope,
            } => write!(
                f,
                "chown {}{owner}:{group} {}{}",
                recursive_flag(scope),
                path.display(),
                excluded_suffix(scope)
            ),
            Self::Chmod { path, rule, scope } => {
                let modes = match (rule.dirs, rule.files) {
                    (Some(dirs), Some(files)) if dirs == files => dirs.to_string(),
                    (dirs, files) => format!(
                        "d={},f={}",
                        dirs.map(|m| m.to_string()).unwrap_or_else(|| "-".into()),
                        files.map(|m| m.to_string()).unwrap_or_else(|| "-".into())
                    ),
                };
                write!(
                    f,
                    "chmod {}{modes} {}{}",
                    recursive_flag(scope),
                    path.display(),
                    excluded_suffix(scope)
                )
            }
            Self::SetAcl { path, grant, scope } => write!(
                f,
                "setfacl {}-m {grant} {}{}",
                recursive_flag(scope),
                path.display(),
                excluded_suffix(scope)
            ),
            Self::SetDefaultAcl { path, grant, scope } => write!(
                f,
                "setfacl {}-d -m {grant} {}{}",
                recursive_flag(scope),
                path.display(),
                excluded_suffix(scope)
            ),
            Self::RemoveAcl { path, user, scope } => write!(
                f,
                "setfacl {}-x u:{user},d:u:{user} {}{}",
                recursive_flag(scope),
                path.display(),
                excluded_suffix(scope)
            ),
        }
    }
}

/// The actions for one path class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub class: PathClassKind,
    pub path: PathBuf,
    /// Refused ACL calls in this step are recorded instead of aborting
    #[serde(default)]
    pub tolerate_acl_denied: bool,
    pub actions: Vec<Action>,
}

/// Inputs the reconciler re-checks before executing a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanParams {
    pub document_root: PathBuf,
    pub shared_home: PathBuf,
    pub runtime_user: String,
    pub code_owner: String,
    pub shared_group: String,
    pub artifact_path: PathBuf,
}

/// Ordered steps for one document root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub params: PlanParams,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn from_model(model: &StateModel) -> Self {
        let p = &model.params;
        Self {
            params: PlanParams {
                document_root: p.document_root.clone(),
                shared_home: p.shared_home.clone(),
                runtime_user: p.runtime_user.clone(),
                code_owner: p.code_owner.clone(),
                shared_group: p.shared_group.clone(),
                artifact_path: p.artifact_path.clone(),
            },
            steps: model.classes.iter().map(step_for).collect(),
        }
    }

    /// Every action in execution order.
    pub fn actions(&self) -> impl Iterator<Item = (&Step, &Action)> {
        self.steps
            .iter()
            .flat_map(|step| step.actions.iter().map(move |action| (step, action)))
    }
}

fn step_for(class: &PathClass) -> Step {
    let path = class.path.clone();
    let (actions, tolerate_acl_denied) = match &class.desired {
        Desired::SharedHomeRoot {
            code_owner,
            traverse,
        } => (
            vec![
                Action::EnsureIdentity {
                    identity: code_owner.clone(),
                },
                Action::SetAcl {
                    path: path.clone(),
                    grant: traverse.clone(),
                    scope: TreeScope::single(),
                },
                Action::SetDefaultAcl {
                    path: path.clone(),
                    grant: traverse.clone(),
                    scope: TreeScope::single(),
                },
            ],
            false,
        ),
        Desired::ScriptsDir { ownership, mode } => (
            vec![
                Action::CreateDir {
                    path: path.clone(),
                    owner: ownership.owner.clone(),
                    group: ownership.group.clone(),
                    mode: *mode,
                    parents: None,
                },
                Action::Chown {
                    path: path.clone(),
                    owner: ownership.owner.clone(),
                    group: ownership.group.clone(),
                    scope: TreeScope::single(),
                },
                Action::Chmod {
                    path: path.clone(),
                    rule: ModeRule::dirs_only(mode.bits()),
                    scope: TreeScope::single(),
                },
            ],
            false,
        ),
        Desired::DotResource {
            kind,
            ownership,
            mode,
        } => {
            let action = match kind {
                EntryKind::File => Action::CreateFile {
                    path: path.clone(),
                    owner: ownership.owner.clone(),
                    group: ownership.group.clone(),
                    mode: *mode,
                },
                _ => Action::CreateDir {
                    path: path.clone(),
                    owner: ownership.owner.clone(),
                    group: ownership.group.clone(),
                    mode: *mode,
                    parents: None,
                },
            };
            (vec![action], false)
        }
        Desired::CodeTree {
            ownership,
            modes,
            runtime_user,
            exclude,
        } => {
            let outside_writable = TreeScope::recursive().excluding(exclude.iter().cloned());
            // ACL scrub runs before chmod: dropping the last named entry
            // rewrites the group bits from the mask.
            (
                vec![
                    Action::Chown {
                        path: path.clone(),
                        owner: ownership.owner.clone(),
                        group: ownership.group.clone(),
                        scope: TreeScope::recursive(),
                    },
                    Action::RemoveAcl {
                        path: path.clone(),
                        user: runtime_user.clone(),
                        scope: outside_writable.clone(),
                    },
                    Action::Chmod {
                        path: path.clone(),
                        rule: *modes,
                        scope: outside_writable,
                    },
                ],
                false,
            )
        }
        Desired::WritableDir {
            ownership,
            mode,
            grant,
            parent_mode,
        } => (
            vec![
                Action::CreateDir {
                    path: path.clone(),
                    owner: ownership.owner.clone(),
                    group: ownership.group.clone(),
                    mode: *mode,
                    parents: Some(*parent_mode),
                },
                Action::Chown {
                    path: path.clone(),
                    owner: ownership.owner.clone(),
                    group: ownership.group.clone(),
                    scope: TreeScope::recursive(),
                },
                Action::Chmod {
                    path: path.clone(),
                    rule: ModeRule::uniform(mode.bits()),
                    scope: TreeScope::recursive(),
                },
                Action::SetAcl {
                    path: path.clone(),
                    grant: grant.clone(),
                    scope: TreeScope::recursive(),
                },
                Action::SetDefaultAcl {
                    path: path.clone(),
                    grant: grant.clone(),
                    scope: TreeScope::recursive(),
                },
            ],
            true,
        ),
    };
    Step {
        class: class.kind(),
        path,
        tolerate_acl_denied,
        actions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ResolvedParams;
    use pretty_assertions::assert_eq;

    fn model() -> StateModel {
        StateModel::build(ResolvedParams {
            document_root: PathBuf::from("/home/shop/public_html"),
            shared_home: PathBuf::from("/home/shop"),
            runtime_user: "shop".into(),
            code_owner: "shop-code".into(),
            shared_group: "shop".into(),
            shell: PathBuf::from("/bin/bash"),
            writable: vec!["wp-content/uploads".into()],
            artifact_path: PathBuf::from("/home/shop/scripts/fix_permissions_public_html"),
        })
        .unwrap()
    }

    #[test]
    fn only_writable_steps_tolerate_acl_denial() {
        let plan = Plan::from_model(&model());
        for step in &plan.steps {
            assert_eq!(
                step.tolerate_acl_denied,
                step.class == PathClassKind::WritableDir,
                "{}",
                step.class
            );
        }
    }

    #[test]
    fn identity_is_ensured_before_any_acl_names_it() {
        let plan = Plan::from_model(&model());
        let (_, first) = plan.actions().next().unwrap();
        assert!(matches!(first, Action::EnsureIdentity { identity } if identity.name == "shop-code"));
    }

    #[test]
    fn writable_step_actions_render_like_shell_commands() {
        let plan = Plan::from_model(&model());
        let writable = plan.steps.last().unwrap();
        let rendered: Vec<String> = writable.actions.iter().map(|a| a.to_string()).collect();

        assert_eq!(
            rendered,
            vec![
                "mkdir -p -m 2775 /home/shop/public_html/wp-content/uploads (shop-code:shop)",
                "chown -R shop-code:shop /home/shop/public_html/wp-content/uploads",
                "chmod -R 2775 /home/shop/public_html/wp-content/uploads",
                "setfacl -R -m u:shop:rwX /home/shop/public_html/wp-content/uploads",
                "setfacl -R -d -m u:shop:rwX /home/shop/public_html/wp-content/uploads",
            ]
        );
    }

    #[test]
    fn code_tree_chmod_skips_writable() {
        let plan = Plan::from_model(&model());
        let code = plan
            .steps
            .iter()
            .find(|s| s.class == PathClassKind::CodeTree)
            .unwrap();
        let rendered: Vec<String> = code.actions.iter().map(|a| a.to_string()).collect();

        assert_eq!(
            rendered,
            vec![
                "chown -R shop-code:shop /home/shop/public_html",
                "setfacl -R -x u:shop,d:u:shop /home/shop/public_html (excluding 1 writable)",
                "chmod -R d=0755,f=0644 /home/shop/public_html (excluding 1 writable)",
            ]
        );
    }
}
