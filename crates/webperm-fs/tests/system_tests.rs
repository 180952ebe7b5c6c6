//! SystemOps against a real temporary directory.
//!
//! Ownership is only ever set to the current user, so these run unprivileged.

#![cfg(target_os = "linux")]

use assert_fs::prelude::*;
use predicates::prelude::*;
use webperm_fs::{Mode, ModeRule, PermissionOps, SystemOps, TreeScope, state_digest};

fn current_owner(ops: &SystemOps, temp: &assert_fs::TempDir) -> (String, String) {
    let meta = ops.stat(temp.path()).unwrap().unwrap();
    (meta.owner, meta.group)
}

#[test]
fn code_tree_modes_skip_writable_subtree() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("index.php").write_str("<?php").unwrap();
    temp.child("wp-content/themes/style.css").write_str("body{}").unwrap();
    temp.child("wp-content/uploads/a.jpg").write_str("jpg").unwrap();
    let uploads = temp.child("wp-content/uploads");

    let ops = SystemOps::new();
    let scope = TreeScope::recursive().excluding([uploads.path().to_path_buf()]);
    let before = state_digest(&ops, &[uploads.path()]).unwrap();

    ops.chmod_recursive(temp.path(), &ModeRule::split(0o755, 0o644), &scope)
        .unwrap();

    let css = ops.stat(temp.child("wp-content/themes/style.css").path()).unwrap().unwrap();
    assert_eq!(css.mode.bits(), 0o644);
    assert_eq!(state_digest(&ops, &[uploads.path()]).unwrap(), before);
}

#[test]
fn artifact_write_replaces_content_in_place() {
    let temp = assert_fs::TempDir::new().unwrap();
    let ops = SystemOps::new();
    let (owner, group) = current_owner(&ops, &temp);
    let artifact = temp.child("scripts/fix_permissions_shop.test");

    ops.write_file(artifact.path(), b"version = 1\n", &owner, &group, Mode::new(0o750))
        .unwrap();
    artifact.assert(predicate::str::starts_with("version = 1"));

    ops.write_file(artifact.path(), b"version = 1\n# edited\n", &owner, &group, Mode::new(0o750))
        .unwrap();
    artifact.assert(predicate::str::contains("# edited"));
    temp.child("scripts").assert(predicate::path::is_dir());
}

#[test]
fn dot_resources_are_created_once() {
    let temp = assert_fs::TempDir::new().unwrap();
    let ops = SystemOps::new();
    let (owner, group) = current_owner(&ops, &temp);
    let profile = temp.child(".bash_profile");
    profile.write_str("umask 027\n").unwrap();

    let created = ops
        .create_file(profile.path(), &owner, &group, Mode::new(0o644))
        .unwrap();

    assert!(!created);
    profile.assert("umask 027\n");
}

#[test]
fn digest_is_stable_without_changes() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("wp-config.php").write_str("<?php").unwrap();
    temp.child("wp-admin").create_dir_all().unwrap();

    let ops = SystemOps::new();
    let first = state_digest(&ops, &[temp.path()]).unwrap();
    let second = state_digest(&ops, &[temp.path()]).unwrap();

    assert_eq!(first, second);
    assert!(first.starts_with("sha256:"));
}
