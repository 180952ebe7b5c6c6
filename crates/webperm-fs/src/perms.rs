//! Permission values: octal modes, ACL permission triples and walk scopes.
//!
//! Everything here serializes to a human-readable form (`"2775"`, `"rwX"`)
//! because these values are embedded verbatim in generated repair artifacts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A POSIX mode including the special bits (`0o7777` mask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mode(u32);

impl Mode {
    pub const fn new(bits: u32) -> Self {
        Self(bits & 0o7777)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether any execute bit is set.
    pub const fn any_exec(self) -> bool {
        self.0 & 0o111 != 0
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04o}", self.0)
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim_start_matches("0o");
        if digits.is_empty() || digits.len() > 5 {
            return Err(Error::InvalidMode { value: s.to_string() });
        }
        u32::from_str_radix(digits, 8)
            .ok()
            .filter(|bits| *bits <= 0o7777)
            .map(Mode)
            .ok_or_else(|| Error::InvalidMode { value: s.to_string() })
    }
}

impl TryFrom<String> for Mode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        mode.to_string()
    }
}

/// Directory and file modes applied by one chmod pass.
///
/// A `None` side leaves that kind of entry untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dirs: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Mode>,
}

impl ModeRule {
    /// Same mode for directories and files (`chmod -R 2775`).
    pub const fn uniform(bits: u32) -> Self {
        Self {
            dirs: Some(Mode::new(bits)),
            files: Some(Mode::new(bits)),
        }
    }

    pub const fn split(dirs: u32, files: u32) -> Self {
        Self {
            dirs: Some(Mode::new(dirs)),
            files: Some(Mode::new(files)),
        }
    }

    pub const fn dirs_only(bits: u32) -> Self {
        Self {
            dirs: Some(Mode::new(bits)),
            files: None,
        }
    }

    /// The mode this rule wants for an entry of `kind`.
    pub fn mode_for(&self, kind: EntryKind) -> Option<Mode> {
        match kind {
            EntryKind::Dir => self.dirs,
            EntryKind::File => self.files,
            EntryKind::Symlink | EntryKind::Other => None,
        }
    }
}

/// What kind of filesystem entry a path is (symlinks are never followed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Dir,
    File,
    Symlink,
    Other,
}

/// Execute component of an ACL permission triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecBit {
    /// `-`
    Off,
    /// `x`
    On,
    /// `X`: execute only for directories or entries already executable by someone
    Conditional,
}

/// An ACL permission triple in `setfacl` notation (`r-x`, `rwX`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AclPerms {
    pub read: bool,
    pub write: bool,
    pub exec: ExecBit,
}

impl AclPerms {
    /// `r-x`
    pub const TRAVERSE: Self = Self {
        read: true,
        write: false,
        exec: ExecBit::On,
    };

    /// `rwX`
    pub const READ_WRITE_TRAVERSE: Self = Self {
        read: true,
        write: true,
        exec: ExecBit::Conditional,
    };

    /// `---`
    pub const NONE: Self = Self {
        read: false,
        write: false,
        exec: ExecBit::Off,
    };

    /// Resolve to `rwx` bits (r=4, w=2, x=1) for a concrete entry.
    pub fn resolve(self, kind: EntryKind, mode: Mode) -> u8 {
        let mut bits = 0;
        if self.read {
            bits |= 4;
        }
        if self.write {
            bits |= 2;
        }
        let exec = match self.exec {
            ExecBit::Off => false,
            ExecBit::On => true,
            ExecBit::Conditional => kind == EntryKind::Dir || mode.any_exec(),
        };
        if exec {
            bits |= 1;
        }
        bits
    }
}

impl fmt::Display for AclPerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.read { 'r' } else { '-' };
        let w = if self.write { 'w' } else { '-' };
        let x = match self.exec {
            ExecBit::Off => '-',
            ExecBit::On => 'x',
            ExecBit::Conditional => 'X',
        };
        write!(f, "{r}{w}{x}")
    }
}

impl FromStr for AclPerms {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidPerms { value: s.to_string() };
        let chars: Vec<char> = s.chars().collect();
        let [r, w, x] = chars.as_slice() else {
            return Err(invalid());
        };
        let read = match r {
            'r' => true,
            '-' => false,
            _ => return Err(invalid()),
        };
        let write = match w {
            'w' => true,
            '-' => false,
            _ => return Err(invalid()),
        };
        let exec = match x {
            'x' => ExecBit::On,
            'X' => ExecBit::Conditional,
            '-' => ExecBit::Off,
            _ => return Err(invalid()),
        };
        Ok(Self { read, write, exec })
    }
}

impl TryFrom<String> for AclPerms {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AclPerms> for String {
    fn from(perms: AclPerms) -> Self {
        perms.to_string()
    }
}

/// Render resolved `rwx` bits the way `getfacl` prints them.
pub fn format_bits(bits: u8) -> String {
    let r = if bits & 4 != 0 { 'r' } else { '-' };
    let w = if bits & 2 != 0 { 'w' } else { '-' };
    let x = if bits & 1 != 0 { 'x' } else { '-' };
    format!("{r}{w}{x}")
}

/// Access ACL or default (inherited) ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclKind {
    Access,
    Default,
}

/// Qualifier of a named ACL entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Qualifier {
    User(String),
    Group(String),
}

/// A named ACL entry as read back from a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub qualifier: Qualifier,
    /// Resolved `rwx` bits (r=4, w=2, x=1)
    pub bits: u8,
}

impl AclEntry {
    pub fn is_user(&self, name: &str) -> bool {
        matches!(&self.qualifier, Qualifier::User(user) if user == name)
    }

    pub fn grants_write(&self) -> bool {
        self.bits & 2 != 0
    }
}

/// A named-user grant to apply with `set_acl` / `set_default_acl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclGrant {
    pub user: String,
    pub perms: AclPerms,
}

impl AclGrant {
    pub fn new(user: impl Into<String>, perms: AclPerms) -> Self {
        Self {
            user: user.into(),
            perms,
        }
    }
}

impl fmt::Display for AclGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u:{}:{}", self.user, self.perms)
    }
}

/// A single edit applied to one entry's ACL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AclEdit {
    /// Set the named user's entry to exactly these bits
    Grant { user: String, bits: u8 },
    /// Drop the named user's entry if present
    Revoke { user: String },
}

/// How far a recursive operation reaches below its root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeScope {
    #[serde(default)]
    pub recursive: bool,
    /// Subtrees pruned from the walk (absolute paths)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<PathBuf>,
}

impl TreeScope {
    /// Only the root entry itself.
    pub fn single() -> Self {
        Self::default()
    }

    /// The root and every descendant.
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            exclude: Vec::new(),
        }
    }

    pub fn excluding(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.exclude.extend(paths);
        self
    }

    /// Whether `path` falls inside a pruned subtree.
    pub fn excludes(&self, path: &Path) -> bool {
        self.exclude.iter().any(|prefix| path.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("r-x", AclPerms::TRAVERSE)]
    #[case("rwX", AclPerms::READ_WRITE_TRAVERSE)]
    #[case("---", AclPerms::NONE)]
    fn parses_setfacl_notation(#[case] input: &str, #[case] expected: AclPerms) {
        assert_eq!(input.parse::<AclPerms>().unwrap(), expected);
        assert_eq!(expected.to_string(), input);
    }

    #[rstest]
    #[case("rw")]
    #[case("rwxx")]
    #[case("xwr")]
    #[case("")]
    fn rejects_malformed_perms(#[case] input: &str) {
        assert!(input.parse::<AclPerms>().is_err());
    }

    #[test]
    fn conditional_exec_applies_to_directories() {
        let perms = AclPerms::READ_WRITE_TRAVERSE;
        assert_eq!(perms.resolve(EntryKind::Dir, Mode::new(0o2775)), 0o7);
        assert_eq!(perms.resolve(EntryKind::File, Mode::new(0o644)), 0o6);
        assert_eq!(perms.resolve(EntryKind::File, Mode::new(0o2775)), 0o7);
    }

    #[test]
    fn mode_displays_as_four_octal_digits() {
        assert_eq!(Mode::new(0o755).to_string(), "0755");
        assert_eq!(Mode::new(0o2775).to_string(), "2775");
        assert_eq!("2775".parse::<Mode>().unwrap(), Mode::new(0o2775));
        assert_eq!("0o644".parse::<Mode>().unwrap(), Mode::new(0o644));
    }

    #[test]
    fn mode_rejects_out_of_range() {
        assert!("17777".parse::<Mode>().is_err());
        assert!("0789".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_rule_skips_symlinks() {
        let rule = ModeRule::split(0o755, 0o644);
        assert_eq!(rule.mode_for(EntryKind::Dir), Some(Mode::new(0o755)));
        assert_eq!(rule.mode_for(EntryKind::File), Some(Mode::new(0o644)));
        assert_eq!(rule.mode_for(EntryKind::Symlink), None);
    }

    #[test]
    fn scope_excludes_nested_paths() {
        let scope = TreeScope::recursive().excluding([PathBuf::from("/srv/www/wp-content/uploads")]);
        assert!(scope.excludes(Path::new("/srv/www/wp-content/uploads")));
        assert!(scope.excludes(Path::new("/srv/www/wp-content/uploads/2024/a.jpg")));
        assert!(!scope.excludes(Path::new("/srv/www/wp-content/uploads-old")));
        assert!(!scope.excludes(Path::new("/srv/www/wp-content")));
    }
}
